//! Usable-bandwidth estimation from an SNR curve.
//!
//! The SNR curve is mapped to `sign(snr - threshold)`, integrated, and the
//! band edges are placed where the normalised integral crosses `1 - pctl`
//! and `pctl`. Isolated dips below the threshold only dent the integral, so
//! the estimate tolerates noisy curves at the cost of not being the literal
//! longest run above threshold.

/// How many times a crossed low/high pair is nudged before giving up.
pub const MAX_RETRIES: usize = 3;

/// Outcome of [`find_optimal_signal_bandwidth`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandwidthEstimate {
    /// The band `[low, high]` in Hz and the bins it was read from.
    Bounds {
        low: f64,
        high: f64,
        low_index: usize,
        high_index: usize,
        retries: usize,
    },
    /// The low edge never settled below the high edge.
    TooNoisy { retries: usize },
}

impl BandwidthEstimate {
    pub fn bounds(&self) -> Option<[f64; 2]> {
        match *self {
            BandwidthEstimate::Bounds { low, high, .. } => Some([low, high]),
            BandwidthEstimate::TooNoisy { .. } => None,
        }
    }

    pub fn is_too_noisy(&self) -> bool {
        matches!(self, BandwidthEstimate::TooNoisy { .. })
    }
}

/// Cumulative trapezoidal integral with unit spacing; one element shorter
/// than `y`.
pub fn cumulative_trapezoid(y: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    y.windows(2)
        .map(|w| {
            total += 0.5 * (w[0] + w[1]);
            total
        })
        .collect()
}

/// `sign(v)` in {-1, 0, 1}; NaN counts as 0.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Index of the first element minimising `|values[i] - target|`.
fn argmin_distance(values: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Find the widest band of `frequency` where `snr` clears `threshold`.
///
/// `frequency` and `snr` must have the same length. `pctl` is the share of
/// the cumulative credit (typically 0.99) at which the upper edge is placed;
/// the lower edge sits at `1 - pctl`.
///
/// Curves that give the integral no positive peak, fewer than two bins, or
/// a length that differs from `frequency` are reported as
/// [`BandwidthEstimate::TooNoisy`] straight away.
pub fn find_optimal_signal_bandwidth(
    frequency: &[f64],
    snr: &[f64],
    threshold: f64,
    pctl: f64,
) -> BandwidthEstimate {
    if frequency.len() != snr.len() {
        log::warn!(
            "{} frequencies but {} SNR values, no band estimated",
            frequency.len(),
            snr.len()
        );
        return BandwidthEstimate::TooNoisy { retries: 0 };
    }

    let signs: Vec<f64> = snr.iter().map(|s| sign(s - threshold)).collect();
    let mut cum = cumulative_trapezoid(&signs);

    let peak = cum.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if cum.is_empty() || peak == 0.0 || !peak.is_finite() {
        log::debug!("SNR integral has no usable peak ({peak})");
        return BandwidthEstimate::TooNoisy { retries: 0 };
    }

    // A negative peak flips the curve positive; that is the all-noise case
    // and it falls through to the retry loop below.
    for v in &mut cum {
        *v /= peak;
        if *v <= 0.0 {
            *v = -1.0;
        }
    }

    let high = argmin_distance(&cum, pctl) as isize - 1;
    let mut low = argmin_distance(&cum, 1.0 - pctl);

    let mut retries = 0;
    while low as isize > high {
        if retries == MAX_RETRIES {
            return BandwidthEstimate::TooNoisy { retries };
        }
        cum[low] = 1.0;
        low = argmin_distance(&cum, pctl - 1.0);
        retries += 1;
    }

    // low <= high, so high is non-negative here
    let high = high as usize;
    BandwidthEstimate::Bounds {
        low: frequency[low],
        high: frequency[high],
        low_index: low,
        high_index: high,
        retries,
    }
}
