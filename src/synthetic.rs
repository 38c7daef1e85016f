//! Deterministic synthetic waveform windows for demos and tests.

use std::f64::consts::PI;

use serde_json::{json, Map, Value as JsonValue};

use crate::data::model::Trace;

/// Minimal deterministic PRNG (xoshiro256**)
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }
}

/// Stats for a channel `network.station..channel` of event `otime`.
pub fn channel_stats(id: &str, otime: Option<&str>, sampling_rate: f64) -> Map<String, JsonValue> {
    let mut parts = id.split('.');
    let mut field = || parts.next().unwrap_or("").to_string();
    let mut stats = Map::new();
    stats.insert("network".into(), json!(field()));
    stats.insert("station".into(), json!(field()));
    stats.insert("location".into(), json!(field()));
    stats.insert("channel".into(), json!(field()));
    stats.insert("sampling_rate".into(), json!(sampling_rate));
    if let Some(t) = otime {
        stats.insert("otime".into(), json!(t));
    }
    stats
}

/// Window of identical samples.
pub fn constant_window(value: f64, npts: usize, sampling_rate: f64, stats: Map<String, JsonValue>) -> Trace {
    Trace::new(vec![value; npts], 1.0 / sampling_rate, stats)
}

/// Gaussian white noise of the given standard deviation.
pub fn noise_window(
    std_dev: f64,
    npts: usize,
    sampling_rate: f64,
    stats: Map<String, JsonValue>,
    rng: &mut SimpleRng,
) -> Trace {
    let samples = (0..npts).map(|_| rng.gauss(0.0, std_dev)).collect();
    Trace::new(samples, 1.0 / sampling_rate, stats)
}

/// A decaying multi-tone arrival over a white-noise floor.
pub fn arrival_window(
    tones: &[(f64, f64)],
    noise_std: f64,
    npts: usize,
    sampling_rate: f64,
    stats: Map<String, JsonValue>,
    rng: &mut SimpleRng,
) -> Trace {
    let duration = npts as f64 / sampling_rate;
    let samples = (0..npts)
        .map(|i| {
            let t = i as f64 / sampling_rate;
            let envelope = (-3.0 * t / duration).exp();
            let signal: f64 = tones
                .iter()
                .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                .sum();
            envelope * signal + rng.gauss(0.0, noise_std)
        })
        .collect();
    Trace::new(samples, 1.0 / sampling_rate, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_deterministic() {
        let mut a = SimpleRng::new(7);
        let mut b = SimpleRng::new(7);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let x = a.next_f64();
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn channel_stats_build_the_id() {
        let stats = channel_stats("AB.CD..Z", Some("ev"), 100.0);
        let tr = constant_window(1.0, 8, 100.0, stats);
        assert_eq!(tr.id(), "AB.CD..Z");
        assert!((tr.delta - 0.01).abs() < 1e-15);
        assert_eq!(tr.stats["otime"], json!("ev"));
    }
}
