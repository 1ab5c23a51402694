//! File-level loading machinery: format detection, discovery, parsing.
//!
//! Content directories hold one file per list (`kinds.*`, `loot_tables.*`,
//! `stations.*`, `goals.*`, `levels.*`) in any supported format. This module
//! finds and parses those files; cross-reference resolution lives in
//! [`crate::resolve`].

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use workstead_core::catalog::CatalogError;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a content directory.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// Catalog validation rejected the resolved content.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const EXTENSIONS: [(&'static str, Format); 3] = [
        ("ron", Format::Ron),
        ("toml", Format::Toml),
        ("json", Format::Json),
    ];
}

/// Detect the format of a file from its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::EXTENSIONS
        .iter()
        .find(|(name, _)| Some(*name) == ext)
        .map(|(_, format)| *format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name.
///
/// Looks for `{base}.ron`, `{base}.toml`, and `{base}.json`. Returns
/// `Ok(None)` when no candidate exists and `Err(ConflictingFormats)` when
/// more than one does; a list that exists in two formats is always an
/// authoring mistake.
pub fn find_data_file(dir: &Path, base: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let candidates: Vec<PathBuf> = Format::EXTENSIONS
        .iter()
        .map(|(ext, _)| dir.join(format!("{base}.{ext}")))
        .filter(|path| path.exists())
        .collect();

    match candidates.as_slice() {
        [] => Ok(None),
        [single] => Ok(Some(single.clone())),
        [first, second, ..] => Err(DataLoadError::ConflictingFormats {
            a: first.clone(),
            b: second.clone(),
        }),
    }
}

/// Like [`find_data_file`], but the file must exist.
pub fn require_data_file(dir: &Path, base: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its detected format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Deserialize a list from a file. RON and JSON files hold the list at top
/// level; TOML cannot, so the list lives under `key` in a top-level table.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?;
            let list = table
                .get(key)
                .ok_or_else(|| parse_err(format!("missing key '{key}' in TOML file")))?
                .clone();
            list.try_into()
                .map_err(|e: toml::de::Error| parse_err(e.to_string()))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
