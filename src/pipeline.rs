use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::hash;
use crate::metadata::MetadataSource;
use crate::naming::{DerivedNames, categorized_file_name, derive_names};
use crate::subject::{SubjectSource, resolve_subject};

/// Extensions eligible for categorization (compared case-insensitively).
const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// The state a file reached in the routing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteState {
    /// Metadata extraction failed; routed to the catch-all directory.
    MetadataFailed,
    /// Metadata had no usable subject; routed to the catch-all directory.
    SubjectMissing,
    /// A subject was found but the file could not be hashed; left in place.
    HashFailed,
    /// A subject was found and the file was routed to its category.
    Categorized,
    /// The category directory could not be created; routed to the catch-all directory.
    CategorizeDirFailed,
}

/// Where a file should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Move into `destination_dir` under the new `file_name`.
    Categorize {
        destination_dir: PathBuf,
        file_name: String,
    },
    /// Move into the catch-all directory, keeping the original name.
    Uncategorized,
}

impl RouteDecision {
    /// Final path of `source` under this decision.
    pub fn destination(&self, source: &Path, config: &Config) -> PathBuf {
        match self {
            Self::Categorize {
                destination_dir,
                file_name,
            } => destination_dir.join(file_name),
            Self::Uncategorized => {
                let name = source.file_name().unwrap_or(source.as_os_str());
                config.catch_all_dir().join(name)
            }
        }
    }
}

/// What happened to the file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(PathBuf),
    /// Dry run: the file would have been moved here.
    WouldMove(PathBuf),
    Failed {
        destination: PathBuf,
        error: String,
    },
    /// The file was deliberately not touched.
    LeftInPlace,
}

/// The result of routing a single image.
#[derive(Debug)]
pub struct ProcessResult {
    pub path: PathBuf,
    pub state: RouteState,
    /// The raw subject string that was selected, if any.
    pub subject: Option<String>,
    pub subject_source: Option<SubjectSource>,
    pub names: Option<DerivedNames>,
    /// The categorized file name, once computed.
    pub new_file_name: Option<String>,
    /// The decision that was applied. `None` when the file was left in place.
    pub decision: Option<RouteDecision>,
    pub outcome: MoveOutcome,
    /// Error behind a fallback or skip (metadata, hashing, directory creation).
    pub error: Option<String>,
}

impl ProcessResult {
    fn new(path: &Path, state: RouteState) -> Self {
        Self {
            path: path.to_path_buf(),
            state,
            subject: None,
            subject_source: None,
            names: None,
            new_file_name: None,
            decision: None,
            outcome: MoveOutcome::LeftInPlace,
            error: None,
        }
    }
}

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub categorized: usize,
    pub uncategorized: usize,
    pub left_in_place: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, result: &ProcessResult) {
        match (&result.outcome, &result.decision) {
            (MoveOutcome::Failed { .. }, _) => self.failed += 1,
            (MoveOutcome::LeftInPlace, _) | (_, None) => self.left_in_place += 1,
            (_, Some(RouteDecision::Categorize { .. })) => self.categorized += 1,
            (_, Some(RouteDecision::Uncategorized)) => self.uncategorized += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.categorized + self.uncategorized + self.left_in_place + self.failed
    }
}

/// Check if a path has a `.jpg` or `.jpeg` extension, in any case.
pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| JPEG_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List the JPEG files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not entered and only regular files qualify; anything
/// else is skipped silently.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Error reading directory '{}'", dir.display()))?;
        if entry.file_type().is_file() && is_jpeg(entry.path()) {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

/// Make sure the catch-all directory exists.
///
/// Returns `true` if it was missing (and, outside dry run, has been created).
pub fn ensure_catch_all_dir(config: &Config) -> Result<bool> {
    let dir = config.catch_all_dir();
    if dir.is_dir() {
        return Ok(false);
    }
    if !config.dry_run {
        fs::create_dir_all(&dir).with_context(|| {
            format!("Error creating {} directory '{}'", crate::config::CATCH_ALL_DIR, dir.display())
        })?;
    }
    Ok(true)
}

/// Route a single image: extract metadata, resolve its subject, derive the
/// new name and move it.
///
/// Never fails: every problem ends in a defined fallback recorded in the
/// returned [`ProcessResult`]. In dry-run mode the same decision is computed
/// but nothing on disk changes.
pub fn process_image(
    path: &Path,
    source: &mut dyn MetadataSource,
    config: &Config,
) -> ProcessResult {
    let record = source.extract(path);
    if let Some(err) = record.error() {
        log::debug!("Metadata extraction failed for {}: {err}", path.display());
        let mut result = ProcessResult::new(path, RouteState::MetadataFailed);
        result.error = Some(err.to_string());
        return route_uncategorized(result, config);
    }

    let Some(resolved) = resolve_subject(&record) else {
        return route_uncategorized(ProcessResult::new(path, RouteState::SubjectMissing), config);
    };

    let names = derive_names(&resolved.path);
    let mut result = ProcessResult::new(path, RouteState::Categorized);
    result.subject = Some(resolved.path.raw().to_string());
    result.subject_source = Some(resolved.source);

    let content_id = match hash::content_id(path) {
        Ok(id) => id,
        Err(e) => {
            result.state = RouteState::HashFailed;
            result.names = Some(names);
            result.error = Some(format!("{e:#}"));
            return result;
        }
    };

    let destination_dir = config.category_dir(&names.category_dir);
    let file_name = categorized_file_name(&names.deepest_category, &content_id);
    result.names = Some(names);
    result.new_file_name = Some(file_name.clone());
    let decision = RouteDecision::Categorize {
        destination_dir: destination_dir.clone(),
        file_name,
    };
    log::debug!("Routing {} to {:?}", path.display(), decision);

    if !config.dry_run {
        if let Err(e) = fs::create_dir_all(&destination_dir) {
            result.state = RouteState::CategorizeDirFailed;
            result.error = Some(format!(
                "Error creating destination directory '{}': {e}",
                destination_dir.display()
            ));
            return route_uncategorized(result, config);
        }
    }

    result.outcome = apply(path, &decision, config);
    result.decision = Some(decision);
    result
}

fn route_uncategorized(mut result: ProcessResult, config: &Config) -> ProcessResult {
    let decision = RouteDecision::Uncategorized;
    result.outcome = apply(&result.path, &decision, config);
    result.decision = Some(decision);
    result
}

fn apply(path: &Path, decision: &RouteDecision, config: &Config) -> MoveOutcome {
    let destination = decision.destination(path, config);
    if config.dry_run {
        return MoveOutcome::WouldMove(destination);
    }
    match move_file(path, &destination) {
        Ok(()) => MoveOutcome::Moved(destination),
        Err(e) => MoveOutcome::Failed {
            destination,
            error: format!("{e:#}"),
        },
    }
}

/// Rename `src` to `dest`. Refuses to replace an existing file.
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        bail!(
            "failed to move '{}' to '{}': destination already exists",
            src.display(),
            dest.display()
        );
    }
    fs::rename(src, dest).with_context(|| {
        format!(
            "failed to move/rename '{}' to '{}'",
            src.display(),
            dest.display()
        )
    })
}

/// Route every image in order, reporting each result as it completes.
pub fn run_batch(
    images: &[PathBuf],
    source: &mut dyn MetadataSource,
    config: &Config,
    mut report: impl FnMut(&ProcessResult),
) -> RunSummary {
    let mut summary = RunSummary::default();
    for path in images {
        let result = process_image(path, source, config);
        summary.record(&result);
        report(&result);
    }
    summary
}
