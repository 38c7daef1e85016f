use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::model::{MetadataValue, Trace};
use crate::error::{Result, SpectralError};
use crate::spectral::multitaper::SpectralEstimator;

/// Metadata key written with the lower edge of the usable band.
pub const LOWER_BOUND_KEY: &str = "lower-f-bound";
/// Metadata key written with the upper edge of the usable band.
pub const UPPER_BOUND_KEY: &str = "upper-f-bound";
/// Metadata key written with the SNR verdict.
pub const PASS_SNR_KEY: &str = "pass_snr";
/// Metadata key the event identifier is read from.
pub const ORIGIN_TIME_KEY: &str = "otime";

// ---------------------------------------------------------------------------
// SpectrumKind / SpectrumRole – what a spectrum was measured from
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumKind {
    Signal,
    Noise,
}

impl fmt::Display for SpectrumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectrumKind::Signal => write!(f, "signal"),
            SpectrumKind::Noise => write!(f, "noise"),
        }
    }
}

/// A fitted source model attached to a signal spectrum by an external fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceModel {
    pub name: String,
    /// Best-fit parameters by name (e.g. corner frequency, moment).
    pub parameters: BTreeMap<String, f64>,
    /// Frequency axis the model was evaluated on.
    pub frequency: Vec<f64>,
    /// log10 amplitude of the best fit on `frequency`.
    pub best_fit: Vec<f64>,
}

/// State only a signal spectrum carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExtras {
    pub model: Option<SourceModel>,
    /// Usable `[low, high]` band, `None` when undetermined.
    pub bandwidth: Option<[f64; 2]>,
    pub pass_snr: bool,
}

impl Default for SignalExtras {
    fn default() -> Self {
        Self {
            model: None,
            bandwidth: None,
            pass_snr: true,
        }
    }
}

/// State only a noise spectrum carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseExtras {
    /// Noise frequencies at or below the signal's lowest bin, which the
    /// interpolation onto the signal axis cannot represent.
    pub lost_frequencies: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpectrumRole {
    Signal(SignalExtras),
    Noise(NoiseExtras),
}

impl SpectrumRole {
    fn for_kind(kind: SpectrumKind) -> Self {
        match kind {
            SpectrumKind::Signal => SpectrumRole::Signal(SignalExtras::default()),
            SpectrumKind::Noise => SpectrumRole::Noise(NoiseExtras::default()),
        }
    }

    pub fn kind(&self) -> SpectrumKind {
        match self {
            SpectrumRole::Signal(_) => SpectrumKind::Signal,
            SpectrumRole::Noise(_) => SpectrumKind::Noise,
        }
    }
}

// ---------------------------------------------------------------------------
// SpectralAmplitude – one spectrum of one waveform window
// ---------------------------------------------------------------------------

/// Frequency/amplitude spectrum of a single window.
///
/// `amplitude` holds either PSD or spectral amplitude; which one is not
/// tracked. Apply [`to_amplitude`](Self::to_amplitude) and
/// [`to_psd`](Self::to_psd) exactly once each, in the order you mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectralAmplitude")]
pub struct SpectralAmplitude {
    identifier: String,
    event: Option<String>,
    sampling_rate: f64,
    frequency: Vec<f64>,
    amplitude: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
    role: SpectrumRole,
    /// Jackknife standard error of ln(PSD) as estimated. Not rescaled by
    /// conversions.
    log_psd_stderr: Option<Vec<f64>>,
}

/// Serialized form, re-checked on the way in.
#[derive(Deserialize)]
struct RawSpectralAmplitude {
    identifier: String,
    sampling_rate: f64,
    frequency: Vec<f64>,
    amplitude: Vec<f64>,
    metadata: BTreeMap<String, MetadataValue>,
    role: SpectrumRole,
    log_psd_stderr: Option<Vec<f64>>,
}

impl TryFrom<RawSpectralAmplitude> for SpectralAmplitude {
    type Error = SpectralError;

    fn try_from(raw: RawSpectralAmplitude) -> Result<Self> {
        check_axes(&raw.frequency, raw.amplitude.len(), raw.sampling_rate)?;
        if let Some(se) = &raw.log_psd_stderr {
            if se.len() != raw.frequency.len() {
                return Err(SpectralError::LengthMismatch {
                    frequency: raw.frequency.len(),
                    amplitude: se.len(),
                });
            }
        }
        Ok(SpectralAmplitude {
            event: raw.metadata.get(ORIGIN_TIME_KEY).map(ToString::to_string),
            identifier: raw.identifier,
            sampling_rate: raw.sampling_rate,
            frequency: raw.frequency,
            amplitude: raw.amplitude,
            metadata: raw.metadata,
            role: raw.role,
            log_psd_stderr: raw.log_psd_stderr,
        })
    }
}

/// Same length as the amplitudes, non-negative and strictly increasing,
/// with a positive sampling rate.
fn check_axes(frequency: &[f64], amplitude_len: usize, sampling_rate: f64) -> Result<()> {
    if frequency.len() != amplitude_len {
        return Err(SpectralError::LengthMismatch {
            frequency: frequency.len(),
            amplitude: amplitude_len,
        });
    }
    if frequency.first().is_some_and(|f| *f < 0.0)
        || frequency
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
    {
        return Err(SpectralError::InvalidWindow(
            "frequency bins must be non-negative and strictly increasing".into(),
        ));
    }
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(SpectralError::InvalidWindow(format!(
            "sampling rate must be positive, got {sampling_rate}"
        )));
    }
    Ok(())
}

impl SpectralAmplitude {
    /// Build a spectrum from explicit arrays.
    ///
    /// `frequency` must be strictly increasing and non-negative and as long
    /// as `amplitude`.
    pub fn new(
        kind: SpectrumKind,
        identifier: impl Into<String>,
        sampling_rate: f64,
        frequency: Vec<f64>,
        amplitude: Vec<f64>,
    ) -> Result<Self> {
        check_axes(&frequency, amplitude.len(), sampling_rate)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("sampling_rate".to_string(), MetadataValue::Float(sampling_rate));

        Ok(SpectralAmplitude {
            identifier: identifier.into(),
            event: None,
            sampling_rate,
            frequency,
            amplitude,
            metadata,
            role: SpectrumRole::for_kind(kind),
            log_psd_stderr: None,
        })
    }

    /// Attach descriptive metadata. The event identifier is taken from the
    /// `otime` field when present.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, MetadataValue>) -> Self {
        self.metadata.extend(metadata);
        self.event = self.metadata.get(ORIGIN_TIME_KEY).map(ToString::to_string);
        self.metadata.insert(
            "sampling_rate".to_string(),
            MetadataValue::Float(self.sampling_rate),
        );
        self
    }

    /// Estimate the spectrum of a waveform window. The zero-frequency bin is
    /// dropped.
    pub fn from_trace<E>(kind: SpectrumKind, trace: &Trace, estimator: &E) -> Result<Self>
    where
        E: SpectralEstimator + ?Sized,
    {
        let estimate = estimator.estimate(&trace.samples, trace.delta)?;
        let mut frequency = estimate.frequency;
        let mut psd = estimate.psd;
        if !frequency.is_empty() {
            frequency.remove(0);
            psd.remove(0);
        }

        let mut spectrum = SpectralAmplitude::new(
            kind,
            trace.id(),
            trace.sampling_rate(),
            frequency,
            psd,
        )?
        .with_metadata(trace.metadata());
        spectrum.log_psd_stderr = estimate.log_psd_stderr.map(|mut se| {
            if !se.is_empty() {
                se.remove(0);
            }
            se
        });

        log::debug!(
            "{} {} spectrum: {} bins up to {:.2} Hz",
            spectrum.identifier,
            kind,
            spectrum.len(),
            spectrum.frequency.last().copied().unwrap_or(0.0)
        );
        Ok(spectrum)
    }

    // -- Unit conversions --

    /// PSD → spectral amplitude: `amp = sqrt(psd * fs * N)`.
    pub fn to_amplitude(&mut self) {
        let scale = self.sampling_rate * self.amplitude.len() as f64;
        for a in &mut self.amplitude {
            *a = (*a * scale).sqrt();
        }
    }

    /// Spectral amplitude → PSD: `psd = amp^2 / (fs * N)`.
    pub fn to_psd(&mut self) {
        let scale = self.sampling_rate * self.amplitude.len() as f64;
        for a in &mut self.amplitude {
            *a = a.powi(2) / scale;
        }
    }

    /// Frequency-domain integration: divide by `2πf`.
    pub fn integrate(&mut self) {
        for (a, f) in self.amplitude.iter_mut().zip(&self.frequency) {
            *a /= 2.0 * PI * f;
        }
    }

    /// Frequency-domain differentiation: multiply by `2πf`.
    pub fn differentiate(&mut self) {
        for (a, f) in self.amplitude.iter_mut().zip(&self.frequency) {
            *a *= 2.0 * PI * f;
        }
    }

    // -- Accessors --

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> SpectrumKind {
        self.role.kind()
    }

    pub fn role(&self) -> &SpectrumRole {
        &self.role
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    pub fn log_psd_stderr(&self) -> Option<&[f64]> {
        self.log_psd_stderr.as_deref()
    }

    /// Number of frequency bins.
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    // -- Signal-only state --

    pub fn signal_extras(&self) -> Option<&SignalExtras> {
        match &self.role {
            SpectrumRole::Signal(extras) => Some(extras),
            SpectrumRole::Noise(_) => None,
        }
    }

    fn signal_extras_mut(&mut self) -> Result<&mut SignalExtras> {
        match &mut self.role {
            SpectrumRole::Signal(extras) => Ok(extras),
            SpectrumRole::Noise(_) => Err(SpectralError::WrongKind {
                expected: SpectrumKind::Signal,
                found: SpectrumKind::Noise,
            }),
        }
    }

    /// Usable band of a signal spectrum.
    pub fn bandwidth(&self) -> Option<[f64; 2]> {
        self.signal_extras().and_then(|e| e.bandwidth)
    }

    /// SNR verdict of a signal spectrum; `None` for noise.
    pub fn pass_snr(&self) -> Option<bool> {
        self.signal_extras().map(|e| e.pass_snr)
    }

    pub fn model(&self) -> Option<&SourceModel> {
        self.signal_extras().and_then(|e| e.model.as_ref())
    }

    pub fn set_model(&mut self, model: SourceModel) -> Result<()> {
        self.signal_extras_mut()?.model = Some(model);
        Ok(())
    }

    /// Store the band estimate and verdict and mirror them into metadata.
    /// Noise spectra carry no verdict and are left untouched.
    pub(crate) fn record_assessment(&mut self, bandwidth: Option<[f64; 2]>, pass: bool) {
        let SpectrumRole::Signal(extras) = &mut self.role else {
            return;
        };
        extras.bandwidth = bandwidth;
        extras.pass_snr = pass;

        self.metadata.insert(
            LOWER_BOUND_KEY.to_string(),
            bandwidth.map(|b| b[0]).into(),
        );
        self.metadata.insert(
            UPPER_BOUND_KEY.to_string(),
            bandwidth.map(|b| b[1]).into(),
        );
        self.metadata
            .insert(PASS_SNR_KEY.to_string(), MetadataValue::Bool(pass));
    }

    // -- Noise-only state --

    pub fn lost_frequencies(&self) -> Option<&[f64]> {
        match &self.role {
            SpectrumRole::Noise(extras) => Some(&extras.lost_frequencies),
            SpectrumRole::Signal(_) => None,
        }
    }

    /// Resample onto `target` by linear interpolation, clamping outside the
    /// current axis. Bins at or below `target[0]` are recorded as lost.
    pub(crate) fn resample_onto(&mut self, target: &[f64]) {
        let floor = target.first().copied().unwrap_or(f64::NEG_INFINITY);
        let lost: Vec<f64> = self
            .frequency
            .iter()
            .copied()
            .filter(|f| *f <= floor)
            .collect();

        self.amplitude = interp(target, &self.frequency, &self.amplitude);
        self.frequency = target.to_vec();
        self.log_psd_stderr = None;
        if let SpectrumRole::Noise(extras) = &mut self.role {
            extras.lost_frequencies = lost;
        }
    }
}

impl fmt::Display for SpectralAmplitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, event:{}, {} bins)",
            self.kind(),
            self.identifier,
            self.event.as_deref().unwrap_or("-"),
            self.len()
        )
    }
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`. `xp` must be
/// increasing; points outside it take the end values.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let (Some(&x_first), Some(&x_last)) = (xp.first(), xp.last()) else {
        return vec![f64::NAN; x.len()];
    };
    let last = xp.len() - 1;

    x.iter()
        .map(|&xi| {
            if xi <= x_first {
                return fp[0];
            }
            if xi >= x_last {
                return fp[last];
            }
            // first index with xp[j] > xi; 1 <= j <= last
            let j = xp.partition_point(|&v| v <= xi);
            let (x0, x1) = (xp[j - 1], xp[j]);
            let (y0, y1) = (fp[j - 1], fp[j]);
            y0 + (y1 - y0) * (xi - x0) / (x1 - x0)
        })
        .collect()
}
