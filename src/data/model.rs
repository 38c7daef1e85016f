use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Stats keys that never make it into a spectrum's metadata.
const EXCLUDED_STATS: [&str; 4] = ["processing", "sac", "calib", "_format"];

// ---------------------------------------------------------------------------
// MetadataValue – a single sanitised metadata field
// ---------------------------------------------------------------------------

/// A primitive metadata value. Anything richer is stringified on the way in.
/// Spectra are sorted by metadata, so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

// -- Manual Eq/Ord so metadata can key a BTreeMap or drive a sort --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) | Float(_) => 2,
                String(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            // Mixed numerics compare by value so a distance column holding
            // both ints and floats still sorts sensibly.
            (Integer(a), Float(b)) => (*a as f64)
                .total_cmp(b)
                .then(std::cmp::Ordering::Less),
            (Float(a), Integer(b)) => a
                .total_cmp(&(*b as f64))
                .then(std::cmp::Ordering::Greater),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl From<Option<f64>> for MetadataValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(MetadataValue::Null, MetadataValue::Float)
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Sanitise one stats value: numbers and strings pass through, anything
    /// else becomes its JSON text.
    pub fn sanitise(val: &JsonValue) -> MetadataValue {
        match val {
            JsonValue::String(s) => MetadataValue::String(s.clone()),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    MetadataValue::Float(f)
                } else {
                    MetadataValue::String(n.to_string())
                }
            }
            other => MetadataValue::String(other.to_string()),
        }
    }
}

/// Reduce a free-form stats mapping to primitive metadata, dropping the
/// bookkeeping keys a waveform reader attaches.
pub fn sanitise_metadata(stats: &Map<String, JsonValue>) -> BTreeMap<String, MetadataValue> {
    stats
        .iter()
        .filter(|(key, _)| !EXCLUDED_STATS.contains(&key.as_str()))
        .map(|(key, val)| (key.clone(), MetadataValue::sanitise(val)))
        .collect()
}

// ---------------------------------------------------------------------------
// Trace – one waveform window
// ---------------------------------------------------------------------------

/// A single waveform window: samples, sampling interval and its stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Sample values.
    pub samples: Vec<f64>,
    /// Sampling interval in seconds.
    pub delta: f64,
    /// Free-form stats (network, station, origin time, distances, ...).
    #[serde(default)]
    pub stats: Map<String, JsonValue>,
}

impl Trace {
    pub fn new(samples: Vec<f64>, delta: f64, stats: Map<String, JsonValue>) -> Self {
        Trace {
            samples,
            delta,
            stats,
        }
    }

    /// SEED-style identifier `network.station.location.channel`.
    pub fn id(&self) -> String {
        ["network", "station", "location", "channel"]
            .iter()
            .map(|key| match self.stats.get(*key) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Sampling rate in Hz, from stats when present, else `1 / delta`.
    pub fn sampling_rate(&self) -> f64 {
        self.stats
            .get("sampling_rate")
            .and_then(JsonValue::as_f64)
            .unwrap_or(1.0 / self.delta)
    }

    /// Sanitised metadata, always carrying `delta`, `sampling_rate` and `npts`.
    pub fn metadata(&self) -> BTreeMap<String, MetadataValue> {
        let mut meta = sanitise_metadata(&self.stats);
        meta.entry("delta".into())
            .or_insert(MetadataValue::Float(self.delta));
        meta.entry("sampling_rate".into())
            .or_insert(MetadataValue::Float(self.sampling_rate()));
        meta.entry("npts".into())
            .or_insert(MetadataValue::Integer(self.samples.len() as i64));
        meta
    }
}
