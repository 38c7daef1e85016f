//! Data layer: waveform windows, metadata sanitisation and loading.
//!
//! Architecture:
//! ```text
//!  .json / .csv / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Vec<Trace>
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  Trace    │  samples, delta, free-form stats
//!   └──────────┘
//!        │  sanitise_metadata
//!        ▼
//!   BTreeMap<String, MetadataValue>  → spectral::SpectralAmplitude
//! ```

pub mod loader;
pub mod model;
