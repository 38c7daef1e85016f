use thiserror::Error;

use crate::spectral::amplitude::SpectrumKind;

// ---------------------------------------------------------------------------
// SpectralError – structural failures that abort the detecting operation
// ---------------------------------------------------------------------------

/// Errors raised by spectrum construction, pairing, grouping and persistence.
///
/// Numerical degradations (a too-noisy SNR curve, a failed coverage or
/// sub-band check) are not errors: they clear the pair's pass flag and are
/// reported through `log`.
#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("ID mismatch between signal: {signal} and noise: {noise}")]
    IdMismatch { signal: String, noise: String },

    #[error("cannot pair similar spectrum kinds: {0} with {0}")]
    KindCollision(SpectrumKind),

    #[error("expected a {expected} spectrum, got {found}")]
    WrongKind {
        expected: SpectrumKind,
        found: SpectrumKind,
    },

    #[error("events are mismatched: {0:?}")]
    EventMismatch(Vec<Option<String>>),

    #[error("channel {0} appears more than once in the group")]
    DuplicateChannel(String),

    #[error("a spectral group needs at least one signal/noise pair")]
    EmptyGroup,

    #[error("got {signal} signal windows but {noise} noise windows")]
    WindowCountMismatch { signal: usize, noise: usize },

    #[error("frequency has {frequency} bins but amplitude has {amplitude}")]
    LengthMismatch { frequency: usize, amplitude: usize },

    #[error("signal and noise of {0} do not share a frequency axis and interpolation is disabled")]
    FrequencyAxisMismatch(String),

    #[error("invalid waveform window: {0}")]
    InvalidWindow(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} method is not currently supported")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpectralError>;
