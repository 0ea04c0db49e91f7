use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use exif_tree::config::{CATCH_ALL_DIR, Config, MetadataBackend};
use exif_tree::metadata;
use exif_tree::pipeline::{self, MoveOutcome, ProcessResult, RouteState};
use exif_tree::subject::SubjectSource;

const SEPARATOR: &str = "-------------------------------------------------";

/// Progress text goes to stdout, or through the log (stderr) when stdout
/// carries the JSON report.
macro_rules! progress {
    ($json:expr, $($arg:tt)*) => {
        if $json {
            log::info!($($arg)*);
        } else {
            println!($($arg)*);
        }
    };
}

#[derive(Parser, Debug)]
#[command(
    name = "exif-tree",
    version,
    about = "Sort JPEG images into category directories named after their XMP subject tags"
)]
struct Cli {
    /// Directory containing the JPEG files to categorize
    #[arg(value_name = "TARGET_DIR")]
    target_dir: PathBuf,

    /// Preview moves and renames without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Read metadata through exiftool instead of the built-in XMP reader
    #[arg(long)]
    exiftool: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = Config::new(&cli.target_dir);
    config.dry_run = cli.dry_run;
    if cli.exiftool {
        config.backend = MetadataBackend::ExifTool;
    }
    config.validate()?;

    let json = cli.json;
    if pipeline::ensure_catch_all_dir(&config)? {
        let verb = if config.dry_run { "Would create" } else { "Created" };
        let dir = config.catch_all_dir();
        progress!(json, "{verb} {CATCH_ALL_DIR} directory: {}", dir.display());
    }

    progress!(json, "--- Starting Image Categorization and Renaming ---");
    progress!(json, "Target Directory: {}", config.target_dir.display());
    if config.dry_run {
        progress!(json, "DRY RUN MODE: No files will be moved or renamed.");
    } else {
        progress!(json, "Actual run: Files will be moved and renamed.");
    }
    progress!(json, "{SEPARATOR}");

    let images = pipeline::collect_images(&config.target_dir)?;
    log::debug!("Found {} JPEG file(s)", images.len());

    let mut source = metadata::open_source(config.backend)?;
    log::debug!("Metadata source: {}", config.backend.name());

    let mut json_results = Vec::new();
    let summary = pipeline::run_batch(&images, source.as_mut(), &config, |result| {
        print_result(result, &config, json);
        if json {
            json_results.push(result_to_json(result));
        }
    });
    drop(source);

    progress!(json, "--- Renaming and Categorization Complete ---");
    progress!(
        json,
        "Done: {} categorized, {} uncategorized, {} left in place, {} failed out of {} images",
        summary.categorized,
        summary.uncategorized,
        summary.left_in_place,
        summary.failed,
        summary.total()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    Ok(())
}

/// Print the status block for one file, ending with the separator line.
///
/// Per-file errors always go to stderr.
fn print_result(result: &ProcessResult, config: &Config, json: bool) {
    let path = result.path.display();
    progress!(json, "Processing: {path}");

    match (&result.subject, result.subject_source) {
        (Some(subject), Some(SubjectSource::Hierarchical)) => {
            progress!(json, "  Found HierarchicalSubject: {subject}");
        }
        (Some(subject), Some(SubjectSource::Flat)) => {
            progress!(
                json,
                "  No HierarchicalSubject found, falling back to Subject: {subject}"
            );
        }
        _ => {}
    }

    match result.state {
        RouteState::MetadataFailed => {
            let err = result.error.as_deref().unwrap_or("unknown error");
            eprintln!("Error extracting metadata for {path}: {err}");
            progress!(json, "  Moving to {CATCH_ALL_DIR}.");
        }
        RouteState::SubjectMissing => {
            progress!(
                json,
                "  No Hierarchical Subject or Subject found. Moving to {CATCH_ALL_DIR}."
            );
        }
        RouteState::HashFailed => {
            let err = result.error.as_deref().unwrap_or("unknown error");
            eprintln!("Error generating hash for {path}: {err}");
            progress!(json, "  Leaving file in place.");
        }
        RouteState::Categorized | RouteState::CategorizeDirFailed => {
            if let Some(ref names) = result.names {
                progress!(json, "  Found top-level category: '{}'", names.category_dir);
                progress!(json, "  Found deepest category: '{}'", names.deepest_category);
                let destination = config.category_dir(&names.category_dir);
                progress!(json, "  Destination Directory: '{}'", destination.display());
            }
            if let Some(ref name) = result.new_file_name {
                progress!(json, "  New filename will be: '{name}'");
            }
            if result.state == RouteState::CategorizeDirFailed {
                if let Some(ref err) = result.error {
                    eprintln!("{err}");
                }
                progress!(
                    json,
                    "  Moving '{path}' to {CATCH_ALL_DIR} due to directory creation error."
                );
            }
        }
    }

    match &result.outcome {
        MoveOutcome::Moved(dest) => {
            progress!(json, "  Moved '{path}' to '{}'", dest.display());
        }
        MoveOutcome::WouldMove(dest) => {
            progress!(json, "  (Dry Run) Would move '{path}' to '{}'", dest.display());
        }
        MoveOutcome::Failed { error, .. } => eprintln!("Error moving file: {error}"),
        MoveOutcome::LeftInPlace => {}
    }

    progress!(json, "{SEPARATOR}");
}

fn result_to_json(result: &ProcessResult) -> serde_json::Value {
    let (outcome, destination, move_error) = match &result.outcome {
        MoveOutcome::Moved(dest) => ("moved", Some(dest), None),
        MoveOutcome::WouldMove(dest) => ("would_move", Some(dest), None),
        MoveOutcome::Failed { destination, error } => ("failed", Some(destination), Some(error)),
        MoveOutcome::LeftInPlace => ("left_in_place", None, None),
    };

    serde_json::json!({
        "path": result.path.display().to_string(),
        "state": result.state,
        "subject": result.subject,
        "category": result.names.as_ref().map(|n| &n.category_dir),
        "deepest_category": result.names.as_ref().map(|n| &n.deepest_category),
        "new_file_name": result.new_file_name,
        "outcome": outcome,
        "destination": destination.map(|d| d.display().to_string()),
        "error": move_error.or(result.error.as_ref()),
    })
}
