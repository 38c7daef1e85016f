//! Multitaper power spectral density estimation.
//!
//! Uses the sine tapers of Riedel & Sidorenko: `K` orthonormal tapers whose
//! eigenspectra are averaged into a one-sided PSD. The taper count is tied
//! to the time-bandwidth product the same way DPSS estimators do
//! (`K = 2 * NW - 1`).

use std::f64::consts::PI;

use realfft::RealFftPlanner;

use crate::config::MultitaperConfig;
use crate::error::{Result, SpectralError};

/// A PSD estimate including the zero-frequency bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumEstimate {
    pub frequency: Vec<f64>,
    pub psd: Vec<f64>,
    /// Jackknife standard error of ln(psd), when requested.
    pub log_psd_stderr: Option<Vec<f64>>,
}

/// Turns a sampled window into a one-sided PSD.
///
/// Implementations must return `frequency` and `psd` of equal length,
/// starting at 0 Hz.
pub trait SpectralEstimator: Sync {
    fn estimate(&self, samples: &[f64], delta: f64) -> Result<SpectrumEstimate>;
}

/// Sine-taper multitaper estimator.
#[derive(Debug, Clone, Default)]
pub struct SineMultitaper {
    config: MultitaperConfig,
}

impl SineMultitaper {
    pub fn new(config: MultitaperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MultitaperConfig {
        &self.config
    }

    /// The first `k` unit-energy sine tapers of length `n`.
    pub fn tapers(n: usize, k: usize) -> Vec<Vec<f64>> {
        let m = (n + 1) as f64;
        let norm = (2.0 / m).sqrt();
        (1..=k)
            .map(|order| {
                (1..=n)
                    .map(|i| norm * (PI * order as f64 * i as f64 / m).sin())
                    .collect()
            })
            .collect()
    }
}

impl SpectralEstimator for SineMultitaper {
    fn estimate(&self, samples: &[f64], delta: f64) -> Result<SpectrumEstimate> {
        let n = samples.len();
        if n < 2 {
            return Err(SpectralError::InvalidWindow(format!(
                "need at least 2 samples, got {n}"
            )));
        }
        if !(delta.is_finite() && delta > 0.0) {
            return Err(SpectralError::InvalidWindow(format!(
                "sampling interval must be positive, got {delta}"
            )));
        }
        let k = self.config.tapers();
        if k > n {
            return Err(SpectralError::InvalidConfig(format!(
                "{k} tapers requested for a {n}-sample window"
            )));
        }
        let nfft = self.config.nfft.unwrap_or(n).max(n);

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(nfft);
        let mut input = r2c.make_input_vec();
        let mut output = r2c.make_output_vec();
        let bins = output.len();

        // |Y_k(f)|^2 per taper
        let mut eigen = Vec::with_capacity(k);
        for taper in Self::tapers(n, k) {
            input.fill(0.0);
            for ((slot, x), w) in input.iter_mut().zip(samples).zip(&taper) {
                *slot = x * w;
            }
            r2c.process(&mut input, &mut output)
                .map_err(|e| SpectralError::InvalidWindow(e.to_string()))?;
            eigen.push(output.iter().map(|c| c.norm_sqr()).collect::<Vec<f64>>());
        }

        let nyquist = if nfft % 2 == 0 { Some(bins - 1) } else { None };
        let one_sided = |i: usize| {
            if i == 0 || Some(i) == nyquist {
                1.0
            } else {
                2.0
            }
        };

        let psd: Vec<f64> = (0..bins)
            .map(|i| {
                let mean = eigen.iter().map(|e| e[i]).sum::<f64>() / k as f64;
                one_sided(i) * delta * mean
            })
            .collect();

        let frequency: Vec<f64> = (0..bins)
            .map(|i| i as f64 / (nfft as f64 * delta))
            .collect();

        let log_psd_stderr = self
            .config
            .statistics
            .then(|| (0..bins).map(|i| jackknife_log_stderr(&eigen, i)).collect());

        Ok(SpectrumEstimate {
            frequency,
            psd,
            log_psd_stderr,
        })
    }
}

/// Delete-one jackknife standard error of ln(mean eigenspectrum) at bin `i`.
fn jackknife_log_stderr(eigen: &[Vec<f64>], i: usize) -> f64 {
    let k = eigen.len() as f64;
    let total: f64 = eigen.iter().map(|e| e[i]).sum();
    let logs: Vec<f64> = eigen
        .iter()
        .map(|e| ((total - e[i]) / (k - 1.0)).max(f64::MIN_POSITIVE).ln())
        .collect();
    let mean = logs.iter().sum::<f64>() / k;
    let var = (k - 1.0) / k * logs.iter().map(|l| (l - mean).powi(2)).sum::<f64>();
    var.sqrt()
}
