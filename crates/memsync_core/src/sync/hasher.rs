//! Content digests for change detection.
//!
//! # Invariants
//! - Change detection looks only at content; modification time is ignored.
//! - Files are hashed in fixed-size chunks so memory stays bounded.

use super::ledger::Ledger;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub const CHUNK_SIZE: usize = 4096;

/// SHA-256 of everything `reader` yields, as lowercase hex.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, as lowercase hex.
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn digest_file(path: &Path) -> io::Result<String> {
    digest_reader(File::open(path)?)
}

/// True when the ledger has no record for `relative_path` or its recorded
/// digest differs from the file's current content.
pub fn has_changed(path: &Path, relative_path: &str, ledger: &Ledger) -> io::Result<bool> {
    let Some(record) = ledger.get(relative_path) else {
        return Ok(true);
    };
    Ok(digest_file(path)? != record.digest)
}

#[cfg(test)]
mod tests {
    use super::{digest_bytes, digest_reader, has_changed, CHUNK_SIZE};
    use crate::sync::ledger::Ledger;
    use chrono::Utc;

    #[test]
    fn digest_matches_known_sha256() {
        assert_eq!(
            digest_bytes(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn streaming_digest_equals_buffer_digest_across_chunk_boundaries() {
        let data = vec![7u8; CHUNK_SIZE * 3 + 17];
        assert_eq!(digest_reader(data.as_slice()).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn has_changed_ignores_touch_without_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.md");
        std::fs::write(&path, "hello").unwrap();

        let mut ledger = Ledger::empty(dir.path().join("ledger.json"));
        assert!(has_changed(&path, "a.md", &ledger).unwrap());

        ledger.record("a.md", digest_bytes(b"hello"), "e1", Utc::now());
        std::fs::write(&path, "hello").unwrap();
        assert!(!has_changed(&path, "a.md", &ledger).unwrap());

        std::fs::write(&path, "hello!").unwrap();
        assert!(has_changed(&path, "a.md", &ledger).unwrap());
    }
}
