use std::path::PathBuf;

use serde_json::json;

use specmod::config::ProcessingConfig;
use specmod::data::loader::load_windows;
use specmod::data::model::Trace;
use specmod::persist::{read_spectra, write_spectra, ReadGate, SaveFormat};
use specmod::synthetic::{channel_stats, constant_window, noise_window, SimpleRng};
use specmod::{SignalNoisePair, SineMultitaper, SpectralAmplitude, SpectralError, SpectralGroup, SpectrumKind};

const RATE: f64 = 100.0;
const NPTS: usize = 1000;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("specmod-it-{}-{name}", std::process::id()))
}

fn event_windows(ids: &[&str], otime: &str, seed: u64) -> (Vec<Trace>, Vec<Trace>) {
    let mut rng = SimpleRng::new(seed);
    ids.iter()
        .map(|id| {
            let stats = channel_stats(id, Some(otime), RATE);
            (
                constant_window(1.0, NPTS, RATE, stats.clone()),
                noise_window(1e-8, NPTS, RATE, stats, &mut rng),
            )
        })
        .unzip()
}

#[test]
fn constant_signal_over_quiet_noise_passes_across_the_band() {
    let mut rng = SimpleRng::new(11);
    let stats = channel_stats("AB.CD..Z", Some("2019-07-06T03:19:53Z"), RATE);
    let signal_trace = constant_window(1.0, NPTS, RATE, stats.clone());
    let noise_trace = noise_window(1e-8, NPTS, RATE, stats, &mut rng);

    let estimator = SineMultitaper::default();
    let signal = SpectralAmplitude::from_trace(SpectrumKind::Signal, &signal_trace, &estimator).unwrap();
    let noise = SpectralAmplitude::from_trace(SpectrumKind::Noise, &noise_trace, &estimator).unwrap();
    assert_eq!(signal.len(), NPTS / 2);
    assert!((signal.frequency()[0] - 0.1).abs() < 1e-12);

    let pair = SignalNoisePair::new(noise, signal).unwrap();
    assert!(pair.snr_curve().iter().all(|&r| r > 3.0));
    assert!(pair.pass_snr());
    assert_eq!(pair.event(), Some("2019-07-06T03:19:53Z"));

    let nyquist = RATE / 2.0;
    let [low, high] = pair.bandwidth().unwrap();
    assert!(low < 0.02 * nyquist, "low edge {low}");
    assert!(high > 0.95 * nyquist, "high edge {high}");
    assert!(low < high);
}

#[test]
fn identical_windows_fail_the_coverage_check() {
    let stats = channel_stats("AB.CD..Z", None, RATE);
    let mut rng = SimpleRng::new(5);
    let trace = noise_window(1.0, 256, RATE, stats, &mut rng);

    let group = SpectralGroup::from_streams(
        std::slice::from_ref(&trace),
        std::slice::from_ref(&trace),
        &ProcessingConfig::default(),
    )
    .unwrap();
    let pair = group.get("AB.CD..Z").unwrap();
    assert!(pair.snr_curve().iter().all(|&r| (r - 1.0).abs() < 1e-9));
    assert!(!pair.pass_snr());
    assert_eq!(pair.bandwidth(), None);
    assert_eq!(group.event(), None);
}

#[test]
fn streams_group_by_channel_and_look_up_case_insensitively() {
    let (signals, noises) = event_windows(&["AB.CD..HHZ", "AB.EF..HHN"], "ev-1", 3);
    let group = SpectralGroup::from_streams(&signals, &noises, &ProcessingConfig::default()).unwrap();

    assert_eq!(group.len(), 2);
    assert_eq!(group.event(), Some("ev-1"));
    assert_eq!(group.channels(), vec!["AB.CD..HHZ", "AB.EF..HHN"]);
    let exact = group.get("AB.EF..HHN").unwrap();
    let lower = group.get("ab.ef..hhn").unwrap();
    assert!(std::ptr::eq(exact, lower));
    assert!(group.iter().all(|p| p.pass_snr()));
}

#[test]
fn windows_from_different_events_cannot_be_grouped() {
    let (mut signals, mut noises) = event_windows(&["AB.CD..HHZ"], "ev-1", 3);
    let (s2, n2) = event_windows(&["AB.EF..HHZ"], "ev-2", 4);
    signals.extend(s2);
    noises.extend(n2);

    let err = SpectralGroup::from_streams(&signals, &noises, &ProcessingConfig::default()).unwrap_err();
    match err {
        SpectralError::EventMismatch(events) => {
            assert_eq!(events.len(), 2);
            assert!(events.contains(&Some("ev-1".to_string())));
            assert!(events.contains(&Some("ev-2".to_string())));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn json_windows_load_into_a_group() {
    let samples: Vec<f64> = vec![1.0; 200];
    let quiet: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1e-7 } else { -1e-7 }).collect();
    let record = |data: &Vec<f64>| {
        json!({
            "data": data,
            "delta": 0.01,
            "network": "AB", "station": "CD", "location": "", "channel": "HHZ",
            "otime": "ev-json",
            "repi": 12.5,
            "processing": ["detrend"],
        })
    };
    let signal_path = scratch("signal.json");
    let noise_path = scratch("noise.json");
    std::fs::write(&signal_path, json!([record(&samples)]).to_string()).unwrap();
    std::fs::write(&noise_path, json!([record(&quiet)]).to_string()).unwrap();

    let signals = load_windows(&signal_path).unwrap();
    let noises = load_windows(&noise_path).unwrap();
    let group = SpectralGroup::from_streams(&signals, &noises, &ProcessingConfig::default()).unwrap();

    let pair = group.get("AB.CD..HHZ").unwrap();
    assert_eq!(pair.event(), Some("ev-json"));
    let meta = pair.signal().metadata();
    assert!(meta.contains_key("repi"));
    assert!(!meta.contains_key("processing"));
    assert_eq!(group.sorted_by_metadata("repi").len(), 1);

    std::fs::remove_file(signal_path).ok();
    std::fs::remove_file(noise_path).ok();
}

#[test]
fn groups_survive_a_trusted_round_trip() {
    let (signals, noises) = event_windows(&["AB.CD..HHZ", "AB.EF..HHZ"], "ev-rt", 9);
    let group = SpectralGroup::from_streams(&signals, &noises, &ProcessingConfig::default()).unwrap();

    let written = write_spectra(&scratch("round-trip"), std::slice::from_ref(&group), SaveFormat::Json).unwrap();
    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("spec"));

    let back = read_spectra(&written, SaveFormat::Json, ReadGate::Trusted)
        .unwrap()
        .unwrap();
    assert_eq!(back.len(), 1);
    let restored = &back[0];
    assert_eq!(restored.event(), group.event());
    assert_eq!(restored.channels(), group.channels());
    for (a, b) in group.iter().zip(restored.iter()) {
        assert_eq!(a.pass_snr(), b.pass_snr());
        assert_eq!(a.signal().len(), b.signal().len());
        let ([al, ah], [bl, bh]) = (a.bandwidth().unwrap(), b.bandwidth().unwrap());
        assert!((al - bl).abs() < 1e-12 && (ah - bh).abs() < 1e-12);
    }

    std::fs::remove_file(written).ok();
}
