//! Spectral layer: estimation, signal/noise pairing and event grouping.
//!
//! ```text
//!   Trace (signal)   Trace (noise)
//!        │                │        multitaper: SpectralEstimator
//!        ▼                ▼
//!   SpectralAmplitude  SpectralAmplitude
//!        └──────┬─────────┘
//!               ▼
//!   ┌────────────────────┐  interpolate noise, SNR curve,
//!   │  SignalNoisePair   │  bandwidth estimate, sub-band check
//!   └────────────────────┘
//!               │  one per channel
//!               ▼
//!   ┌────────────────────┐
//!   │   SpectralGroup    │  one event
//!   └────────────────────┘
//! ```

pub mod amplitude;
pub mod bandwidth;
pub mod group;
pub mod multitaper;
pub mod pair;

pub use amplitude::{SourceModel, SpectralAmplitude, SpectrumKind, SpectrumRole};
pub use bandwidth::{find_optimal_signal_bandwidth, BandwidthEstimate};
pub use group::SpectralGroup;
pub use multitaper::{SineMultitaper, SpectralEstimator, SpectrumEstimate};
pub use pair::SignalNoisePair;
