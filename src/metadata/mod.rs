//! Subject metadata extraction.
//!
//! A [`MetadataSource`] turns an image path into a [`MetadataRecord`]: a map
//! of field names to loosely typed values, or an extraction error. Two
//! sources are provided:
//!
//! - [`XmpSource`] — reads the XMP packet straight out of the JPEG
//! - [`ExifToolSource`] — drives one long-lived `exiftool -stay_open` process
//!
//! Field names follow exiftool's naming of the XMP tags
//! (`HierarchicalSubject` for `lr:hierarchicalSubject`, `Subject` for
//! `dc:subject`), so both sources produce interchangeable records.

mod exiftool;
mod xmp;

pub use exiftool::ExifToolSource;
pub use xmp::XmpSource;

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::MetadataBackend;

/// Field holding `|`-separated category paths (Lightroom `lr:hierarchicalSubject`).
pub const HIERARCHICAL_SUBJECT: &str = "HierarchicalSubject";
/// Field holding flat keywords (`dc:subject`).
pub const SUBJECT: &str = "Subject";

/// A single metadata value as reported by the source.
///
/// exiftool's JSON output types values by their content: a tag that looks
/// numeric arrives as a number, a multi-valued tag as an array. Accessors on
/// [`MetadataRecord`] only hand out the shapes callers asked for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    List(Vec<MetadataValue>),
    Other(serde_json::Value),
}

impl MetadataValue {
    /// The string content, if this value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items.into_iter().map(MetadataValue::Text).collect())
    }
}

/// Metadata extracted from one file.
///
/// Either carries an extraction error or a field map. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    fields: BTreeMap<String, MetadataValue>,
    error: Option<String>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record for a file whose metadata could not be extracted.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            fields: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<MetadataValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<MetadataValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.fields.get(name)
    }

    /// The field as text. `None` if absent or not a string.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(MetadataValue::as_text)
    }

    /// The field as a sequence. A lone text value counts as a one-element
    /// sequence, since exiftool collapses single-item lists to a scalar.
    pub fn list(&self, name: &str) -> Option<&[MetadataValue]> {
        match self.get(name)? {
            MetadataValue::List(items) => Some(items),
            v @ MetadataValue::Text(_) => Some(std::slice::from_ref(v)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Source of per-file metadata.
///
/// A source is acquired once before a batch and dropped after it; any
/// resource it holds (such as a child process) is released on drop.
pub trait MetadataSource {
    /// Display name used in log output.
    fn name(&self) -> &str;
    /// Extract metadata for one file. Failures are reported inside the record.
    fn extract(&mut self, path: &Path) -> MetadataRecord;
}

/// Open the metadata source selected by `backend`.
pub fn open_source(backend: MetadataBackend) -> Result<Box<dyn MetadataSource>> {
    match backend {
        MetadataBackend::Native => Ok(Box::new(XmpSource::new())),
        MetadataBackend::ExifTool => Ok(Box::new(ExifToolSource::spawn()?)),
    }
}
