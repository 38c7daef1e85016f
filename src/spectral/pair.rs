use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{BandSelection, PairConfig};
use crate::error::{Result, SpectralError};
use crate::spectral::amplitude::{SourceModel, SpectralAmplitude, SpectrumKind};
use crate::spectral::bandwidth::{find_optimal_signal_bandwidth, BandwidthEstimate};

// ---------------------------------------------------------------------------
// SignalNoisePair – signal and noise spectra of one channel
// ---------------------------------------------------------------------------

/// A signal spectrum coupled with the noise spectrum of the same channel.
///
/// Construction validates the pairing, optionally moves the noise onto the
/// signal's frequency axis and derives the SNR curve, the usable band and
/// the pass flag. The band and flag are stored on the signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignalNoisePair")]
pub struct SignalNoisePair {
    signal: SpectralAmplitude,
    noise: SpectralAmplitude,
    snr: Vec<f64>,
    config: PairConfig,
}

impl SignalNoisePair {
    /// Pair two spectra with the default acceptance parameters.
    pub fn new(a: SpectralAmplitude, b: SpectralAmplitude) -> Result<Self> {
        Self::with_config(a, b, PairConfig::default())
    }

    /// Pair two spectra. They may be given in either order; one must be a
    /// signal and the other noise, with matching identifiers.
    pub fn with_config(a: SpectralAmplitude, b: SpectralAmplitude, config: PairConfig) -> Result<Self> {
        config.validate()?;
        check_ids(&a, &b)?;
        let (signal, noise) = match a.kind() {
            SpectrumKind::Signal => (a, b),
            SpectrumKind::Noise => (b, a),
        };

        let mut pair = SignalNoisePair {
            signal,
            noise,
            snr: Vec::new(),
            config,
        };

        if pair.config.interpolate_noise {
            pair.interpolate_noise_to_signal();
        } else if pair.signal.frequency() != pair.noise.frequency() {
            return Err(SpectralError::FrequencyAxisMismatch(
                pair.signal.identifier().to_string(),
            ));
        }

        pair.rederive();
        Ok(pair)
    }

    // -- Bulk conversions --

    /// Integrate both spectra and re-derive the band.
    pub fn integrate(&mut self) {
        self.signal.integrate();
        self.noise.integrate();
        self.rederive();
    }

    /// Differentiate both spectra and re-derive the band.
    pub fn differentiate(&mut self) {
        self.signal.differentiate();
        self.noise.differentiate();
        self.rederive();
    }

    /// PSD → amplitude on both spectra. The band is not re-derived.
    pub fn to_amplitude(&mut self) {
        self.signal.to_amplitude();
        self.noise.to_amplitude();
    }

    /// Amplitude → PSD on both spectra. The band is not re-derived.
    pub fn to_psd(&mut self) {
        self.signal.to_psd();
        self.noise.to_psd();
    }

    // -- Accessors --

    pub fn identifier(&self) -> &str {
        self.signal.identifier()
    }

    pub fn event(&self) -> Option<&str> {
        self.signal.event()
    }

    pub fn signal(&self) -> &SpectralAmplitude {
        &self.signal
    }

    pub fn noise(&self) -> &SpectralAmplitude {
        &self.noise
    }

    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    /// signal / noise per bin, as of the last derivation.
    pub fn snr_curve(&self) -> &[f64] {
        &self.snr
    }

    /// Usable `[low, high]` band, `None` when undetermined.
    pub fn bandwidth(&self) -> Option<[f64; 2]> {
        self.signal.bandwidth()
    }

    pub fn pass_snr(&self) -> bool {
        self.signal.pass_snr().unwrap_or(false)
    }

    /// Noise frequencies dropped by the interpolation onto the signal axis.
    pub fn lost_noise_frequencies(&self) -> &[f64] {
        self.noise.lost_frequencies().unwrap_or(&[])
    }

    /// Attach a fitted source model to the signal.
    pub fn set_model(&mut self, model: SourceModel) -> Result<()> {
        self.signal.set_model(model)
    }

    /// mean(signal)/mean(noise) per configured sub-band; `None` where the
    /// band selects no bins.
    pub fn shearer_ratios(&self) -> Vec<Option<f64>> {
        let freq = self.signal.frequency();
        let sig = self.signal.amplitude();
        let noise = self.noise.amplitude();

        self.config
            .shearer_bands
            .iter()
            .map(|&(low, high)| {
                let selected: Vec<usize> = freq
                    .iter()
                    .enumerate()
                    .filter(|(_, &f)| match self.config.band_selection {
                        // upper edge unchecked, see BandSelection
                        BandSelection::LowerBoundOnly => f >= low,
                        BandSelection::Bounded => low <= f && f <= high,
                    })
                    .map(|(i, _)| i)
                    .collect();
                if selected.is_empty() {
                    return None;
                }
                let count = selected.len() as f64;
                let mean_sig = selected.iter().map(|&i| sig[i]).sum::<f64>() / count;
                let mean_noise = selected.iter().map(|&i| noise[i]).sum::<f64>() / count;
                Some(mean_sig / mean_noise)
            })
            .collect()
    }

    // -- Derivation --

    fn interpolate_noise_to_signal(&mut self) {
        let target = self.signal.frequency().to_vec();
        self.noise.resample_onto(&target);
        if !self.lost_noise_frequencies().is_empty() {
            log::debug!(
                "{}: {} noise bins at or below {:.3} Hz not represented on the signal axis",
                self.identifier(),
                self.lost_noise_frequencies().len(),
                target.first().copied().unwrap_or(0.0)
            );
        }
    }

    /// Recompute SNR, band and pass flag from the current amplitudes.
    fn rederive(&mut self) {
        let id = self.identifier().to_string();
        let tolerance = self.config.snr_tolerance;

        self.snr = self
            .signal
            .amplitude()
            .iter()
            .zip(self.noise.amplitude())
            .map(|(s, n)| s / n)
            .collect();

        let mut pass = true;
        let mut bandwidth = None;

        let coverage = self.snr.iter().filter(|&&r| r >= tolerance).count();
        if coverage <= self.config.min_points {
            log::warn!(
                "{id}: only {coverage} bins reach SNR {tolerance}, need more than {}",
                self.config.min_points
            );
            pass = false;
        } else {
            match find_optimal_signal_bandwidth(
                self.signal.frequency(),
                &self.snr,
                tolerance,
                self.config.percentile,
            ) {
                BandwidthEstimate::Bounds { low, high, .. } => bandwidth = Some([low, high]),
                BandwidthEstimate::TooNoisy { retries } => {
                    log::warn!("{id} is too noisy (no band after {retries} retries)");
                    pass = false;
                }
            }
        }

        if pass && self.config.shearer_test {
            let ratios = self.shearer_ratios();
            let min_ratio = self.config.shearer_min_ratio;
            if ratios.iter().flatten().any(|r| *r < min_ratio) {
                log::warn!("{id}: sub-band SNR check failed, ratios {ratios:?}");
                pass = false;
            }
        }

        log::debug!("{id}: band {bandwidth:?}, pass {pass}");
        self.signal.record_assessment(bandwidth, pass);
    }
}

/// Serialized form. The SNR curve and verdict are derived again on load.
#[derive(Deserialize)]
struct RawSignalNoisePair {
    signal: SpectralAmplitude,
    noise: SpectralAmplitude,
    config: PairConfig,
}

impl TryFrom<RawSignalNoisePair> for SignalNoisePair {
    type Error = SpectralError;

    fn try_from(raw: RawSignalNoisePair) -> Result<Self> {
        raw.config.validate()?;
        check_ids(&raw.signal, &raw.noise)?;
        if raw.signal.kind() != SpectrumKind::Signal {
            return Err(SpectralError::WrongKind {
                expected: SpectrumKind::Signal,
                found: raw.signal.kind(),
            });
        }
        // noise already sits on the signal axis
        if raw.signal.frequency() != raw.noise.frequency() {
            return Err(SpectralError::FrequencyAxisMismatch(
                raw.signal.identifier().to_string(),
            ));
        }

        let mut pair = SignalNoisePair {
            signal: raw.signal,
            noise: raw.noise,
            snr: Vec::new(),
            config: raw.config,
        };
        pair.rederive();
        Ok(pair)
    }
}

fn check_ids(a: &SpectralAmplitude, b: &SpectralAmplitude) -> Result<()> {
    if a.identifier().to_uppercase() != b.identifier().to_uppercase() {
        return Err(SpectralError::IdMismatch {
            signal: a.identifier().to_string(),
            noise: b.identifier().to_string(),
        });
    }
    if a.kind() == b.kind() {
        return Err(SpectralError::KindCollision(a.kind()));
    }
    Ok(())
}

impl fmt::Display for SignalNoisePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SNP(id:{}, event:{})",
            self.identifier(),
            self.event().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetadataValue;

    const ID: &str = "AB.CD..Z";

    fn axis(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64 * 0.5).collect()
    }

    fn spectrum(kind: SpectrumKind, id: &str, freq: Vec<f64>, amp: Vec<f64>) -> SpectralAmplitude {
        SpectralAmplitude::new(kind, id, 100.0, freq, amp).unwrap()
    }

    fn flat_pair(signal_level: f64, config: PairConfig) -> Result<SignalNoisePair> {
        let freq = axis(40);
        SignalNoisePair::with_config(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), vec![signal_level; 40]),
            spectrum(SpectrumKind::Noise, ID, freq, vec![1.0; 40]),
            config,
        )
    }

    #[test]
    fn id_mismatch_is_rejected() {
        let freq = axis(10);
        let err = SignalNoisePair::new(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), vec![1.0; 10]),
            spectrum(SpectrumKind::Noise, "AB.XX..Z", freq, vec![1.0; 10]),
        )
        .unwrap_err();
        assert!(matches!(err, SpectralError::IdMismatch { .. }));
    }

    #[test]
    fn same_kind_is_rejected() {
        let freq = axis(10);
        let err = SignalNoisePair::new(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), vec![1.0; 10]),
            spectrum(SpectrumKind::Signal, ID, freq, vec![1.0; 10]),
        )
        .unwrap_err();
        assert!(matches!(err, SpectralError::KindCollision(SpectrumKind::Signal)));
    }

    #[test]
    fn ids_match_case_insensitively_in_either_order() {
        let freq = axis(40);
        let pair = SignalNoisePair::new(
            spectrum(SpectrumKind::Noise, "ab.cd..z", freq.clone(), vec![1.0; 40]),
            spectrum(SpectrumKind::Signal, ID, freq, vec![10.0; 40]),
        )
        .unwrap();
        assert_eq!(pair.signal().kind(), SpectrumKind::Signal);
        assert_eq!(pair.identifier(), ID);
    }

    #[test]
    fn strong_signal_passes_with_full_band() {
        let pair = flat_pair(10.0, PairConfig::default()).unwrap();
        assert!(pair.pass_snr());
        assert!(pair.snr_curve().iter().all(|r| (*r - 10.0).abs() < 1e-12));

        let freq = axis(40);
        // all-above curve: cum = k/39, closest to .99 at index 38, minus one
        assert_eq!(pair.bandwidth(), Some([freq[0], freq[37]]));
        assert_eq!(
            pair.signal().metadata()["lower-f-bound"].as_f64(),
            Some(freq[0])
        );
    }

    #[test]
    fn weak_signal_fails_coverage_without_bounds() {
        let pair = flat_pair(2.0, PairConfig::default()).unwrap();
        assert!(!pair.pass_snr());
        assert_eq!(pair.bandwidth(), None);
        assert_eq!(
            pair.signal().metadata()["pass_snr"],
            MetadataValue::Bool(false)
        );
    }

    #[test]
    fn coverage_needs_more_than_min_points() {
        let freq = axis(20);
        let mut amp = vec![1.0; 15];
        amp.extend(vec![10.0; 5]);
        let config = PairConfig {
            shearer_test: false,
            ..PairConfig::default()
        };
        let pair = SignalNoisePair::with_config(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), amp),
            spectrum(SpectrumKind::Noise, ID, freq, vec![1.0; 20]),
            config,
        )
        .unwrap();
        assert!(!pair.pass_snr());
    }

    #[test]
    fn noise_is_interpolated_onto_signal_axis() {
        let sig_freq = axis(40);
        let noise_freq: Vec<f64> = (0..=40).map(|i| i as f64 * 0.25 + 0.25).collect();
        let noise_amp: Vec<f64> = noise_freq.iter().map(|f| f * 0.1).collect();

        let pair = SignalNoisePair::new(
            spectrum(SpectrumKind::Signal, ID, sig_freq.clone(), vec![100.0; 40]),
            spectrum(SpectrumKind::Noise, ID, noise_freq, noise_amp),
        )
        .unwrap();

        assert_eq!(pair.noise().frequency(), &sig_freq[..]);
        assert!((pair.noise().amplitude()[1] - 0.1).abs() < 1e-12);
        // past the noise axis the last value is held
        assert!((pair.noise().amplitude()[39] - 1.025).abs() < 1e-12);
        assert_eq!(pair.lost_noise_frequencies(), &[0.25, 0.5]);
    }

    #[test]
    fn mismatched_axes_without_interpolation_fail() {
        let config = PairConfig {
            interpolate_noise: false,
            ..PairConfig::default()
        };
        let err = SignalNoisePair::with_config(
            spectrum(SpectrumKind::Signal, ID, axis(10), vec![1.0; 10]),
            spectrum(SpectrumKind::Noise, ID, axis(12), vec![1.0; 12]),
            config,
        )
        .unwrap_err();
        assert!(matches!(err, SpectralError::FrequencyAxisMismatch(_)));
    }

    #[test]
    fn shearer_band_selection_modes_differ() {
        // 0.5 Hz bins up to 20 Hz; signal strong only in 2-4 Hz
        let freq = axis(40);
        let sig: Vec<f64> = freq
            .iter()
            .map(|&f| if (2.0..=4.0).contains(&f) { 100.0 } else { 4.0 })
            .collect();
        let make = |selection| {
            let config = PairConfig {
                band_selection: selection,
                ..PairConfig::default()
            };
            SignalNoisePair::with_config(
                spectrum(SpectrumKind::Signal, ID, freq.clone(), sig.clone()),
                spectrum(SpectrumKind::Noise, ID, freq.clone(), vec![1.0; 40]),
                config,
            )
            .unwrap()
        };

        let literal = make(BandSelection::LowerBoundOnly);
        let bounded = make(BandSelection::Bounded);

        // f >= 2 spans bins 3..40: (5*100 + 32*4) / 37
        let ratios = literal.shearer_ratios();
        assert!((ratios[0].unwrap() - (5.0 * 100.0 + 32.0 * 4.0) / 37.0).abs() < 1e-9);
        assert!((ratios[2].unwrap() - 4.0).abs() < 1e-9);

        let ratios = bounded.shearer_ratios();
        assert!((ratios[0].unwrap() - 100.0).abs() < 1e-9);
        // 4-8 Hz shares the 4 Hz bin with the first band
        assert!((ratios[1].unwrap() - (100.0 + 8.0 * 4.0) / 9.0).abs() < 1e-9);
        assert!((ratios[2].unwrap() - 4.0).abs() < 1e-9);
        assert!(literal.pass_snr());
        assert!(bounded.pass_snr());
    }

    #[test]
    fn failing_sub_band_clears_pass() {
        let freq = axis(40);
        // strong below 8 Hz, at the tolerance floor above it
        let sig: Vec<f64> = freq.iter().map(|&f| if f < 8.0 { 50.0 } else { 3.0 }).collect();
        let config = PairConfig {
            band_selection: BandSelection::Bounded,
            shearer_min_ratio: 5.0,
            ..PairConfig::default()
        };
        let pair = SignalNoisePair::with_config(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), sig),
            spectrum(SpectrumKind::Noise, ID, freq, vec![1.0; 40]),
            config,
        )
        .unwrap();
        assert!(pair.bandwidth().is_some());
        assert!(!pair.pass_snr());
    }

    #[test]
    fn integrate_rederives_but_unit_conversion_does_not() {
        let freq = axis(40);
        let sig: Vec<f64> = freq.iter().map(|f| 40.0 * f).collect();
        let mut pair = SignalNoisePair::new(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), sig),
            spectrum(SpectrumKind::Noise, ID, freq.clone(), vec![1.0; 40]),
        )
        .unwrap();
        let amplitude_snr = pair.snr_curve().to_vec();
        let band = pair.bandwidth();

        pair.to_psd();
        assert_eq!(pair.snr_curve(), &amplitude_snr[..]);
        assert_eq!(pair.bandwidth(), band);

        // integration scales both members alike, so the re-derived curve is
        // the PSD ratio (40f)^2
        pair.integrate();
        for (r, f) in pair.snr_curve().iter().zip(&freq) {
            let expected = (40.0 * f).powi(2);
            assert!((r - expected).abs() <= 1e-9 * expected);
        }
        assert!(pair.pass_snr());
        assert_eq!(pair.bandwidth(), band);
    }

    #[test]
    fn estimator_giving_up_clears_pass_and_band() {
        let freq = axis(20);
        let mut signal = vec![1.0; 12];
        signal.extend([10.0; 8]);
        let pair = SignalNoisePair::new(
            spectrum(SpectrumKind::Signal, ID, freq.clone(), signal),
            spectrum(SpectrumKind::Noise, ID, freq, vec![1.0; 20]),
        )
        .unwrap();

        // 8 bins clear the tolerance, so only the band estimate can fail here
        assert_eq!(pair.snr_curve().iter().filter(|r| **r >= 3.0).count(), 8);
        assert!(!pair.pass_snr());
        assert_eq!(pair.bandwidth(), None);
        assert_eq!(pair.signal().metadata()["lower-f-bound"], MetadataValue::Null);
        assert_eq!(pair.signal().metadata()["pass_snr"], MetadataValue::Bool(false));
    }

    #[test]
    fn deserializing_rederives_and_rejects_broken_pairs() {
        let pair = flat_pair(10.0, PairConfig::default()).unwrap();
        let value = serde_json::to_value(&pair).unwrap();

        let mut stale = value.clone();
        stale["snr"] = serde_json::json!([0.0]);
        let back: SignalNoisePair = serde_json::from_value(stale).unwrap();
        assert_eq!(back.snr_curve(), pair.snr_curve());
        assert_eq!(back.bandwidth(), pair.bandwidth());

        let mut truncated = value.clone();
        truncated["noise"]["amplitude"].as_array_mut().unwrap().truncate(10);
        truncated["noise"]["frequency"].as_array_mut().unwrap().truncate(10);
        assert!(serde_json::from_value::<SignalNoisePair>(truncated).is_err());

        let mut swapped = value;
        swapped["noise"]["identifier"] = serde_json::json!("AB.XX..Z");
        assert!(serde_json::from_value::<SignalNoisePair>(swapped).is_err());
    }
}
