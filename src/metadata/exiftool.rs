use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::{HIERARCHICAL_SUBJECT, MetadataRecord, MetadataSource, MetadataValue, SUBJECT};

// exiftool prints this line once it has finished an -execute batch.
const READY_MARKER: &str = "{ready}";

/// Metadata source backed by one long-lived `exiftool -stay_open` process.
///
/// The process is started by [`ExifToolSource::spawn`] and asked to exit when
/// the source is dropped.
pub struct ExifToolSource {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// One element of exiftool's `-json` output array.
#[derive(Debug, Deserialize)]
struct ExifToolEntry {
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, MetadataValue>,
}

impl ExifToolSource {
    /// Start `exiftool` from `PATH`.
    pub fn spawn() -> Result<Self> {
        Self::spawn_with("exiftool")
    }

    /// Start the given exiftool executable.
    pub fn spawn_with(program: impl AsRef<OsStr>) -> Result<Self> {
        let mut child = Command::new(program)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to start exiftool (is it installed and on PATH?)")?;

        let stdin = child.stdin.take().context("exiftool stdin not captured")?;
        let stdout = child.stdout.take().context("exiftool stdout not captured")?;
        log::debug!("exiftool started (pid {})", child.id());

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    /// Run one `-execute` batch for `path` and return its raw JSON output.
    fn query(&mut self, path: &Path) -> Result<String> {
        let arg = path
            .to_str()
            .context("Path is not valid UTF-8")?;
        if arg.contains('\n') {
            bail!("Path contains a newline");
        }

        write!(
            self.stdin,
            "-json\n-charset\nfilename=utf8\n-{HIERARCHICAL_SUBJECT}\n-{SUBJECT}\n{arg}\n-execute\n"
        )
        .context("Failed to send request to exiftool")?;
        self.stdin.flush().context("Failed to send request to exiftool")?;

        let mut output = String::new();
        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .context("Failed to read exiftool output")?;
            if read == 0 {
                bail!("exiftool exited unexpectedly");
            }
            if line.trim_end() == READY_MARKER {
                break;
            }
            output.push_str(&line);
        }
        Ok(output)
    }
}

impl MetadataSource for ExifToolSource {
    fn name(&self) -> &str {
        "exiftool"
    }

    fn extract(&mut self, path: &Path) -> MetadataRecord {
        match self.query(path) {
            Ok(output) => parse_output(&output),
            Err(e) => MetadataRecord::failed(format!("{e:#}")),
        }
    }
}

impl Drop for ExifToolSource {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"-stay_open\nFalse\n");
        let _ = self.stdin.flush();
        match self.child.wait() {
            Ok(status) => log::debug!("exiftool exited with {status}"),
            Err(e) => log::warn!("Failed to wait for exiftool: {e}"),
        }
    }
}

/// Convert exiftool `-json` output for a single file into a record.
pub fn parse_output(output: &str) -> MetadataRecord {
    if output.trim().is_empty() {
        return MetadataRecord::failed("exiftool returned no metadata");
    }

    let entries: Vec<ExifToolEntry> = match serde_json::from_str(output) {
        Ok(entries) => entries,
        Err(e) => return MetadataRecord::failed(format!("Invalid exiftool output: {e}")),
    };
    let Some(entry) = entries.into_iter().next() else {
        return MetadataRecord::failed("exiftool returned no metadata");
    };

    if let Some(error) = entry.error {
        return MetadataRecord::failed(error);
    }

    let mut record = MetadataRecord::new();
    for (name, value) in entry.fields {
        if name != "SourceFile" {
            record.insert(&name, value);
        }
    }
    record
}
