use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SpectralError};
use crate::spectral::SpectralGroup;

/// Extension every spectra file carries.
pub const SPECTRA_EXTENSION: &str = "spec";

// ---------------------------------------------------------------------------
// SaveFormat – the closed set of on-disk encodings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// serde_json encoding of `Vec<SpectralGroup>`.
    Json,
}

impl SaveFormat {
    pub const SUPPORTED: [SaveFormat; 1] = [SaveFormat::Json];

    pub fn name(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
        }
    }
}

impl FromStr for SaveFormat {
    type Err = SpectralError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase();
        Self::SUPPORTED
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or(SpectralError::UnsupportedFormat(wanted))
    }
}

/// Append `.spec` unless the path already ends with it.
pub fn normalise_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == SPECTRA_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(SPECTRA_EXTENSION);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write groups to `path` (normalised to `.spec`). Returns the path written.
pub fn write_spectra(path: &Path, spectra: &[SpectralGroup], format: SaveFormat) -> Result<PathBuf> {
    let path = normalise_path(path);
    let mut writer = BufWriter::new(File::create(&path)?);
    match format {
        SaveFormat::Json => serde_json::to_writer(&mut writer, spectra)?,
    }
    writer.flush()?;
    log::info!("Wrote {} spectral groups to {}", spectra.len(), path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Who vouches for a spectra file before it is decoded.
pub enum ReadGate<'a> {
    /// The caller knows where the file came from.
    Trusted,
    /// Ask first; the callback returns `true` to proceed.
    Confirm(Box<dyn FnOnce(&Path) -> bool + 'a>),
}

impl ReadGate<'_> {
    /// Ask on the terminal, accepting `y` or `yes`.
    pub fn prompt() -> Self {
        ReadGate::Confirm(Box::new(|path: &Path| {
            eprintln!("{}", "=".repeat(40));
            eprintln!("WARNING: {} is about to be decoded.", path.display());
            eprintln!("Only open spectra files whose origin you know and trust.");
            eprintln!("{}", "=".repeat(40));
            eprint!("Open spectra file? ");
            let mut answer = String::new();
            if io::stdin().lock().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        }))
    }
}

/// Read groups back from `path` (normalised to `.spec`).
///
/// Returns `Ok(None)` when the gate declines.
pub fn read_spectra(
    path: &Path,
    format: SaveFormat,
    gate: ReadGate<'_>,
) -> Result<Option<Vec<SpectralGroup>>> {
    let path = normalise_path(path);
    if let ReadGate::Confirm(confirm) = gate {
        if !confirm(&path) {
            log::warn!("Did not open {}", path.display());
            return Ok(None);
        }
    }

    let reader = BufReader::new(File::open(&path)?);
    let spectra: Vec<SpectralGroup> = match format {
        SaveFormat::Json => serde_json::from_reader(reader)?,
    };
    log::info!("Read {} spectral groups from {}", spectra.len(), path.display());
    Ok(Some(spectra))
}
