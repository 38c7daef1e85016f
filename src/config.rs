//! Processing configuration
//!
//! Every knob of the pipeline lives here with a documented default, so a
//! run can be reproduced from a single JSON file. Missing fields fall back
//! to their defaults.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectralError};

/// Complete processing configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub multitaper: MultitaperConfig,
    pub pair: PairConfig,
}

/// Options for the multitaper spectral estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultitaperConfig {
    /// Time-bandwidth product; sets the default taper count.
    pub time_bandwidth: f64,
    /// Number of tapers. `None` uses `2 * time_bandwidth - 1`.
    pub number_of_tapers: Option<usize>,
    /// FFT length. `None` uses the window length; longer values zero-pad.
    pub nfft: Option<usize>,
    /// Also compute the jackknife standard error of the log PSD.
    pub statistics: bool,
}

impl Default for MultitaperConfig {
    fn default() -> Self {
        Self {
            time_bandwidth: 3.0,
            number_of_tapers: None,
            nfft: None,
            statistics: false,
        }
    }
}

impl MultitaperConfig {
    /// Taper count actually used.
    pub fn tapers(&self) -> usize {
        self.number_of_tapers
            .unwrap_or_else(|| ((2.0 * self.time_bandwidth) as usize).saturating_sub(1))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.time_bandwidth.is_finite() && self.time_bandwidth > 0.0) {
            return Err(SpectralError::InvalidConfig(format!(
                "time-bandwidth product must be positive, got {}",
                self.time_bandwidth
            )));
        }
        if self.tapers() == 0 {
            return Err(SpectralError::InvalidConfig("at least one taper is required".into()));
        }
        if self.statistics && self.tapers() < 2 {
            return Err(SpectralError::InvalidConfig(
                "jackknife statistics need at least two tapers".into(),
            ));
        }
        Ok(())
    }
}

/// How the Shearer sub-band check picks the bins belonging to a band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSelection {
    /// `f >= low` on both edges. Every band runs to the top of the axis.
    /// This reproduces the historical results of the pipeline.
    #[default]
    LowerBoundOnly,
    /// `low <= f <= high`.
    Bounded,
}

/// Signal/noise pairing and SNR acceptance parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Interpolate the noise spectrum onto the signal's frequency axis.
    pub interpolate_noise: bool,
    /// Run the sub-band (Shearer) check after the bandwidth estimate.
    pub shearer_test: bool,
    /// SNR a bin must reach to count as signal.
    pub snr_tolerance: f64,
    /// Bins at or above `snr_tolerance` must number more than this.
    pub min_points: usize,
    /// Share of cumulative credit that places the band edges.
    pub percentile: f64,
    /// Sub-bands (Hz) for the Shearer check.
    pub shearer_bands: Vec<(f64, f64)>,
    /// Minimum mean(signal)/mean(noise) per sub-band.
    pub shearer_min_ratio: f64,
    pub band_selection: BandSelection,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            interpolate_noise: true,
            shearer_test: true,
            snr_tolerance: 3.0,
            min_points: 5,
            percentile: 0.99,
            shearer_bands: vec![(2.0, 4.0), (4.0, 8.0), (8.0, 12.0)],
            shearer_min_ratio: 3.0,
            band_selection: BandSelection::LowerBoundOnly,
        }
    }
}

impl PairConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.percentile > 0.0 && self.percentile < 1.0) {
            return Err(SpectralError::InvalidConfig(format!(
                "percentile must lie in (0, 1), got {}",
                self.percentile
            )));
        }
        if let Some((lo, hi)) = self.shearer_bands.iter().find(|(lo, hi)| lo >= hi) {
            return Err(SpectralError::InvalidConfig(format!(
                "shearer band ({lo}, {hi}) is empty"
            )));
        }
        Ok(())
    }
}

impl ProcessingConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ProcessingConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        log::info!("[Config] Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.multitaper.validate()?;
        self.pair.validate()
    }
}
