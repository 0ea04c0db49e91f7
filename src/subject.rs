use crate::metadata::{HIERARCHICAL_SUBJECT, MetadataRecord, MetadataValue, SUBJECT};

/// Separator between levels of a hierarchical subject (`Animals|Birds|Owls`).
pub const HIERARCHY_SEPARATOR: char = '|';

/// A category path from most general to most specific.
///
/// Segments are kept exactly as split, surrounding spaces and empty
/// segments included. At least one segment is not blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPath {
    raw: String,
    segments: Vec<String>,
}

impl SubjectPath {
    /// Split a raw subject on [`HIERARCHY_SEPARATOR`].
    ///
    /// Returns `None` when every segment is blank.
    ///
    /// ```rust
    /// use exif_tree::subject::SubjectPath;
    ///
    /// let path = SubjectPath::parse("Animals|Birds|Owls").unwrap();
    /// assert_eq!(path.top(), "Animals");
    /// assert_eq!(path.deepest(), "Owls");
    ///
    /// let spaced = SubjectPath::parse(" Animals | Owls").unwrap();
    /// assert_eq!(spaced.top(), " Animals ");
    /// assert!(SubjectPath::parse(" | ").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<String> = raw.split(HIERARCHY_SEPARATOR).map(str::to_string).collect();
        if segments.iter().all(|s| s.trim().is_empty()) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The subject string as found in the metadata.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Top-level category.
    pub fn top(&self) -> &str {
        &self.segments[0]
    }

    /// Most specific category. Same as [`top`](Self::top) for single-segment paths.
    pub fn deepest(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }
}

/// Where the resolved subject came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSource {
    Hierarchical,
    Flat,
}

/// A resolved subject and its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubject {
    pub path: SubjectPath,
    pub source: SubjectSource,
}

/// Pick the most specific subject tag from a record.
///
/// Hierarchical tags win over the flat `Subject` field. Among hierarchical
/// tags the one with the most separators is chosen; ties go to the first in
/// the order the metadata source listed them. That order is whatever the
/// source reports and is not guaranteed to be meaningful.
pub fn resolve_subject(record: &MetadataRecord) -> Option<ResolvedSubject> {
    if let Some(path) = record.list(HIERARCHICAL_SUBJECT).and_then(deepest_hierarchical) {
        return Some(ResolvedSubject {
            path,
            source: SubjectSource::Hierarchical,
        });
    }

    let flat = record.text(SUBJECT)?;
    SubjectPath::parse(flat).map(|path| ResolvedSubject {
        path,
        source: SubjectSource::Flat,
    })
}

fn deepest_hierarchical(tags: &[MetadataValue]) -> Option<SubjectPath> {
    let mut best: Option<(usize, SubjectPath)> = None;
    for tag in tags {
        let Some(text) = tag.as_text() else {
            log::debug!("Skipping non-text hierarchical subject entry: {tag:?}");
            continue;
        };
        let Some(path) = SubjectPath::parse(text) else {
            continue;
        };
        let depth = text.matches(HIERARCHY_SEPARATOR).count();
        if best.as_ref().is_none_or(|(max, _)| depth > *max) {
            best = Some((depth, path));
        }
    }
    best.map(|(_, path)| path)
}
