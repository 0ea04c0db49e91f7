use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Number of hex characters kept from the digest.
///
/// Eight characters keep file names short at the cost of collision
/// resistance: two different files can share a prefix.
pub const CONTENT_ID_LEN: usize = 8;

/// Short content identifier: the first [`CONTENT_ID_LEN`] lowercase hex
/// characters of the file's SHA-256 digest.
///
/// The file is streamed through the hasher, never loaded whole.
pub fn content_id(path: &Path) -> Result<String> {
    let digest = sha256_hex(path)?;
    Ok(digest[..CONTENT_ID_LEN].to_string())
}

/// Full lowercase hex SHA-256 digest of a file.
pub fn sha256_hex(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
    digest_reader(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Stream `reader` to its end through SHA-256 and return the hex digest.
fn digest_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn known_digest_prefix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.jpg");
        fs::write(&path, b"abc").unwrap();

        assert_eq!(
            sha256_hex(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_id(&path).unwrap(), "ba7816bf");
    }

    #[test]
    fn same_content_same_id() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpeg");
        fs::write(&a, b"identical bytes").unwrap();
        fs::write(&b, b"identical bytes").unwrap();

        let id = content_id(&a).unwrap();
        assert_eq!(id.len(), CONTENT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id, content_id(&a).unwrap());
        assert_eq!(id, content_id(&b).unwrap());
    }

    #[test]
    fn one_byte_changes_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        let mut bytes = vec![0u8; 20_000];
        fs::write(&path, &bytes).unwrap();
        let before = content_id(&path).unwrap();

        bytes[19_999] = 1;
        fs::write(&path, &bytes).unwrap();
        assert_ne!(before, content_id(&path).unwrap());
    }

    #[test]
    fn empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.jpg");
        fs::write(&path, b"").unwrap();
        assert_eq!(content_id(&path).unwrap(), "e3b0c442");
    }

    /// Yields `data` in small chunks, failing with `Interrupted` before each one.
    struct InterruptingReader {
        data: &'static [u8],
        interrupt_next: bool,
    }

    impl Read for InterruptingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next && !self.data.is_empty() {
                self.interrupt_next = false;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            let n = self.data.len().min(buf.len()).min(2);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let reader = InterruptingReader {
            data: b"abc",
            interrupt_next: true,
        };
        assert_eq!(
            digest_reader(reader).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn read_errors_are_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("disk on fire"))
            }
        }
        assert!(digest_reader(Broken).unwrap_err().to_string().contains("disk on fire"));
    }

    #[test]
    fn missing_file_fails() {
        let err = content_id(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
