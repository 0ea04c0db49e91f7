use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use exif_tree::config::Config;
use exif_tree::metadata::XmpSource;
use exif_tree::pipeline::{
    MoveOutcome, RouteState, collect_images, ensure_catch_all_dir, process_image, run_batch,
};

const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

fn xmp_packet(hierarchical: &[&str], subjects: &[&str]) -> String {
    let bag = |items: &[&str]| {
        items
            .iter()
            .map(|i| format!("<rdf:li>{i}</rdf:li>"))
            .collect::<String>()
    };
    let mut body = String::new();
    if !subjects.is_empty() {
        body.push_str(&format!("<dc:subject><rdf:Bag>{}</rdf:Bag></dc:subject>\n", bag(subjects)));
    }
    if !hierarchical.is_empty() {
        body.push_str(&format!(
            "<lr:hierarchicalSubject><rdf:Bag>{}</rdf:Bag></lr:hierarchicalSubject>\n",
            bag(hierarchical)
        ));
    }
    format!(
        r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
<rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:lr="http://ns.adobe.com/lightroom/1.0/">
{body}</rdf:Description></rdf:RDF></x:xmpmeta>"#
    )
}

/// JPEG stream with an optional XMP APP1 segment and a tiny scan.
fn jpeg_bytes(xmp: Option<&str>, scan: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    if let Some(xmp) = xmp {
        let mut contents = XMP_HEADER.to_vec();
        contents.extend_from_slice(xmp.as_bytes());
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((contents.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&contents);
    }
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    out.extend_from_slice(scan);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn write_jpeg(dir: &Path, name: &str, xmp: Option<String>, scan: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, jpeg_bytes(xmp.as_deref(), scan)).unwrap();
    path
}

fn snapshot(dir: &Path) -> Vec<(PathBuf, Option<Vec<u8>>)> {
    let mut entries: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let contents = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
            (e.into_path(), contents)
        })
        .collect();
    entries.sort();
    entries
}

fn sample_library(dir: &Path) {
    write_jpeg(
        dir,
        "bird.jpg",
        Some(xmp_packet(&["Animals", "Animals|Birds|Owls"], &["Owls", "Birds"])),
        &[0x01, 0x02],
    );
    write_jpeg(
        dir,
        "trip.JPEG",
        Some(xmp_packet(&[], &["Family|Vacation?2024"])),
        &[0x03, 0x04],
    );
    write_jpeg(dir, "photo.jpg", None, &[0x05]);
    fs::write(dir.join("broken.jpg"), b"not a jpeg").unwrap();
    fs::write(dir.join("doc.png"), b"\x89PNG").unwrap();
}

#[test]
fn native_backend_end_to_end() {
    let dir = TempDir::new().unwrap();
    sample_library(dir.path());
    let config = Config::new(dir.path());
    ensure_catch_all_dir(&config).unwrap();

    let images = collect_images(dir.path()).unwrap();
    assert_eq!(images.len(), 4);

    let mut source = XmpSource::new();
    let mut states = Vec::new();
    let summary = run_batch(&images, &mut source, &config, |r| {
        let name = r.path.file_name().unwrap().to_string_lossy().to_string();
        states.push((name, r.state));
    });

    assert_eq!(
        states,
        vec![
            ("bird.jpg".to_string(), RouteState::Categorized),
            ("broken.jpg".to_string(), RouteState::MetadataFailed),
            ("photo.jpg".to_string(), RouteState::SubjectMissing),
            ("trip.JPEG".to_string(), RouteState::Categorized),
        ]
    );
    assert_eq!(summary.categorized, 2);
    assert_eq!(summary.uncategorized, 2);

    let owls: Vec<_> = fs::read_dir(dir.path().join("Animals"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(owls.len(), 1);
    let owl = owls[0].to_string_lossy().to_string();
    assert!(owl.starts_with("Owls_") && owl.ends_with(".jpg"));
    assert_eq!(owl.len(), "Owls_".len() + 8 + ".jpg".len());

    let family: Vec<_> = fs::read_dir(dir.path().join("Family"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert!(family[0].to_string_lossy().starts_with("Vacation_2024_"));

    let catch_all = config.catch_all_dir();
    assert!(catch_all.join("photo.jpg").is_file());
    assert!(catch_all.join("broken.jpg").is_file());
    assert!(dir.path().join("doc.png").is_file());
    assert!(!catch_all.join("doc.png").exists());
}

#[test]
fn identical_content_gets_identical_name() {
    let dir = TempDir::new().unwrap();
    let xmp = xmp_packet(&["Animals|Cats"], &[]);
    let a = write_jpeg(dir.path(), "a.jpg", Some(xmp.clone()), &[0x10]);
    let config = Config::new(dir.path());
    ensure_catch_all_dir(&config).unwrap();

    let first = process_image(&a, &mut XmpSource::new(), &config);
    let MoveOutcome::Moved(first_dest) = first.outcome else {
        panic!("expected move, got {:?}", first.outcome);
    };

    let b = write_jpeg(dir.path(), "b.jpg", Some(xmp), &[0x10]);
    let second = process_image(&b, &mut XmpSource::new(), &config);
    match second.outcome {
        MoveOutcome::Failed { destination, .. } => assert_eq!(destination, first_dest),
        other => panic!("expected collision failure, got {other:?}"),
    }
    assert!(b.is_file());
}

#[test]
fn dry_run_leaves_snapshot_identical() {
    let dir = TempDir::new().unwrap();
    sample_library(dir.path());
    let mut config = Config::new(dir.path());
    config.dry_run = true;

    let before = snapshot(dir.path());
    ensure_catch_all_dir(&config).unwrap();
    let images = collect_images(dir.path()).unwrap();
    let summary = run_batch(&images, &mut XmpSource::new(), &config, |r| {
        assert!(matches!(r.outcome, MoveOutcome::WouldMove(_)));
    });

    assert_eq!(summary.total(), 4);
    assert_eq!(snapshot(dir.path()), before);
}

#[cfg(feature = "cli")]
mod binary {
    use super::*;
    use std::process::Command;

    fn exif_tree() -> Command {
        Command::new(env!("CARGO_BIN_EXE_exif-tree"))
    }

    #[test]
    fn missing_target_exits_one() {
        let status = exif_tree().arg("/nonexistent/exif-tree/photos").output().unwrap().status;
        assert_eq!(status.code(), Some(1));
    }

    #[test]
    fn bad_arguments_exit_one() {
        assert_eq!(exif_tree().output().unwrap().status.code(), Some(1));

        let dir = TempDir::new().unwrap();
        let status = exif_tree().arg(dir.path()).arg("--bogus").output().unwrap().status;
        assert_eq!(status.code(), Some(1));
    }

    #[test]
    fn dry_run_reports_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        sample_library(dir.path());
        let before = snapshot(dir.path());

        let output = exif_tree().arg(dir.path()).arg("--dry-run").output().unwrap();
        assert_eq!(output.status.code(), Some(0));
        assert_eq!(snapshot(dir.path()), before);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("DRY RUN MODE"));
        assert!(stdout.contains("Found HierarchicalSubject: Animals|Birds|Owls"));
        assert!(stdout.contains("New filename will be: 'Owls_"));
        assert!(!stdout.contains("doc.png"));
    }

    #[test]
    fn real_run_with_json_report() {
        let dir = TempDir::new().unwrap();
        sample_library(dir.path());

        let output = exif_tree().arg(dir.path()).arg("--json").output().unwrap();
        assert_eq!(output.status.code(), Some(0));
        assert!(dir.path().join("Uncategorized").join("photo.jpg").is_file());
        assert!(dir.path().join("Animals").is_dir());

        // stdout holds the report and nothing else
        let stdout = String::from_utf8(output.stdout).unwrap();
        let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        let entries = report.as_array().unwrap();
        assert_eq!(entries.len(), 4);

        let states: Vec<_> = entries.iter().map(|e| e["state"].as_str().unwrap()).collect();
        assert_eq!(
            states,
            ["categorized", "metadata_failed", "subject_missing", "categorized"]
        );
        assert!(entries.iter().all(|e| e["outcome"] == "moved"));
        assert_eq!(entries[0]["category"], "Animals");
        assert_eq!(entries[0]["deepest_category"], "Owls");
        assert!(entries[1]["error"].is_string());

        // progress text moved to stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Starting Image Categorization"));
        assert!(stderr.contains("Done: 2 categorized, 2 uncategorized"));
    }

    #[test]
    fn per_file_errors_reach_stderr_with_logging_off() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();

        let output = exif_tree().arg(dir.path()).env("RUST_LOG", "off").output().unwrap();
        assert_eq!(output.status.code(), Some(0));

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Error extracting metadata for"));
        assert!(stderr.contains("broken.jpg"));
        assert!(dir.path().join("Uncategorized").join("broken.jpg").is_file());
    }
}
