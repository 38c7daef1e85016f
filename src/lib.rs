//! Signal/noise spectral pairing for seismic event records.
//!
//! Waveform windows are loaded ([`data`]), turned into spectra by a
//! multitaper estimator, paired per channel to assess the usable signal
//! bandwidth, and grouped per event ([`spectral`]). Groups can be written
//! to and read back from `.spec` files ([`persist`]).

pub mod config;
pub mod data;
pub mod error;
pub mod persist;
pub mod spectral;
pub mod synthetic;

pub use config::{BandSelection, MultitaperConfig, PairConfig, ProcessingConfig};
pub use error::{Result, SpectralError};
pub use spectral::{
    find_optimal_signal_bandwidth, BandwidthEstimate, SignalNoisePair, SineMultitaper,
    SpectralAmplitude, SpectralEstimator, SpectralGroup, SpectrumKind,
};
