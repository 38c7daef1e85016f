use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{PairConfig, ProcessingConfig};
use crate::data::model::{MetadataValue, Trace};
use crate::error::{Result, SpectralError};
use crate::spectral::amplitude::{SpectralAmplitude, SpectrumKind};
use crate::spectral::multitaper::{SineMultitaper, SpectralEstimator};
use crate::spectral::pair::SignalNoisePair;

// ---------------------------------------------------------------------------
// SpectralGroup – every channel of one event
// ---------------------------------------------------------------------------

/// Signal/noise pairs of a single event, keyed by upper-cased channel id.
///
/// Membership is fixed at construction. Bulk operations touch every pair;
/// pairs are independent, so they run in parallel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectralGroup")]
pub struct SpectralGroup {
    event: Option<String>,
    pairs: BTreeMap<String, SignalNoisePair>,
}

impl SpectralGroup {
    /// Group pairs that all belong to the same event.
    pub fn new(pairs: Vec<SignalNoisePair>) -> Result<Self> {
        let Some(first) = pairs.first() else {
            return Err(SpectralError::EmptyGroup);
        };
        let event = first.event().map(str::to_string);
        if pairs.iter().any(|p| p.event() != event.as_deref()) {
            return Err(SpectralError::EventMismatch(
                pairs.iter().map(|p| p.event().map(str::to_string)).collect(),
            ));
        }

        let mut map = BTreeMap::new();
        for pair in pairs {
            let key = pair.identifier().to_uppercase();
            if map.contains_key(&key) {
                return Err(SpectralError::DuplicateChannel(key));
            }
            map.insert(key, pair);
        }

        log::info!(
            "Grouped {} channels for event {}",
            map.len(),
            event.as_deref().unwrap_or("-")
        );
        Ok(SpectralGroup { event, pairs: map })
    }

    /// Estimate, pair and group signal and noise windows that are listed in
    /// the same channel order, using the multitaper estimator.
    pub fn from_streams(
        signals: &[Trace],
        noises: &[Trace],
        config: &ProcessingConfig,
    ) -> Result<Self> {
        config.validate()?;
        let estimator = SineMultitaper::new(config.multitaper.clone())?;
        Self::from_streams_with(&estimator, signals, noises, &config.pair)
    }

    /// As [`from_streams`](Self::from_streams) with any estimator.
    pub fn from_streams_with<E: SpectralEstimator>(
        estimator: &E,
        signals: &[Trace],
        noises: &[Trace],
        pair_config: &PairConfig,
    ) -> Result<Self> {
        if signals.len() != noises.len() {
            return Err(SpectralError::WindowCountMismatch {
                signal: signals.len(),
                noise: noises.len(),
            });
        }

        let pairs = signals
            .par_iter()
            .zip(noises.par_iter())
            .map(|(sig, noise)| {
                let signal = SpectralAmplitude::from_trace(SpectrumKind::Signal, sig, estimator)?;
                let noise = SpectralAmplitude::from_trace(SpectrumKind::Noise, noise, estimator)?;
                SignalNoisePair::with_config(signal, noise, pair_config.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(pairs)
    }

    // -- Bulk operations --

    pub fn integrate(&mut self) {
        self.pairs.par_iter_mut().for_each(|(_, p)| p.integrate());
    }

    pub fn differentiate(&mut self) {
        self.pairs.par_iter_mut().for_each(|(_, p)| p.differentiate());
    }

    pub fn to_amplitude(&mut self) {
        self.pairs.par_iter_mut().for_each(|(_, p)| p.to_amplitude());
    }

    pub fn to_psd(&mut self) {
        self.pairs.par_iter_mut().for_each(|(_, p)| p.to_psd());
    }

    // -- Lookup --

    /// Case-insensitive lookup. A miss logs the channels that are available.
    pub fn get(&self, id: &str) -> Option<&SignalNoisePair> {
        let found = self.pairs.get(&id.to_uppercase());
        if found.is_none() {
            self.report_miss(id);
        }
        found
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SignalNoisePair> {
        let key = id.to_uppercase();
        if !self.pairs.contains_key(&key) {
            self.report_miss(id);
        }
        self.pairs.get_mut(&key)
    }

    fn report_miss(&self, id: &str) {
        log::warn!(
            "id {} not found, available: {:?}",
            id.to_uppercase(),
            self.channels()
        );
    }

    /// Channel keys, sorted.
    pub fn channels(&self) -> Vec<&str> {
        self.pairs.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalNoisePair> {
        self.pairs.values()
    }

    /// Pairs ordered by a signal metadata field (e.g. `repi`). Pairs without
    /// the field come first.
    pub fn sorted_by_metadata(&self, key: &str) -> Vec<&SignalNoisePair> {
        let mut pairs: Vec<&SignalNoisePair> = self.pairs.values().collect();
        pairs.sort_by_cached_key(|p| {
            p.signal()
                .metadata()
                .get(key)
                .cloned()
                .unwrap_or(MetadataValue::Null)
        });
        pairs
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Serialized form. Membership is checked again on load.
#[derive(Deserialize)]
struct RawSpectralGroup {
    event: Option<String>,
    pairs: BTreeMap<String, SignalNoisePair>,
}

impl TryFrom<RawSpectralGroup> for SpectralGroup {
    type Error = SpectralError;

    fn try_from(raw: RawSpectralGroup) -> Result<Self> {
        let group = SpectralGroup::new(raw.pairs.into_values().collect())?;
        if group.event != raw.event {
            return Err(SpectralError::EventMismatch(vec![raw.event, group.event]));
        }
        Ok(group)
    }
}

impl fmt::Display for SpectralGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Spectra(event:{}, size:{})",
            self.event.as_deref().unwrap_or("-"),
            self.len()
        )
    }
}
