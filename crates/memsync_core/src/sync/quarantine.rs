//! Conflict quarantine.
//!
//! # Responsibility
//! - Move conflicted documents out of the source tree for manual resolution.
//!
//! # Invariants
//! - A file is moved, never duplicated: after success only the destination
//!   exists, after failure only the source does.
//! - An earlier quarantined file is never overwritten.
//! - Nothing here merges or edits file content.

use super::hasher::digest_file;
use crate::config::SyncConfig;
use chrono::Utc;
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Quarantine {
    dir: PathBuf,
}

impl Quarantine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.quarantine_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Moves `source` to `relative_path` under the quarantine directory.
    ///
    /// Returns the final destination, which carries a timestamp suffix when
    /// the mirrored path is already taken.
    pub fn quarantine(&self, source: &Path, relative_path: &str) -> io::Result<PathBuf> {
        let destination = self.free_destination(relative_path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(rename_err) = fs::rename(source, &destination) {
            warn!(
                "event=quarantine_move module=quarantine status=fallback path={} error={}",
                relative_path, rename_err
            );
            copy_verify_remove(source, &destination)?;
        }

        info!(
            "event=quarantine_move module=quarantine status=ok path={} destination={}",
            relative_path,
            destination.display()
        );
        Ok(destination)
    }

    /// Quarantined files, sorted, relative to the quarantine directory.
    pub fn list(&self) -> Vec<String> {
        if !self.dir.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<String> = WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| super::scanner::relative_key(&self.dir, entry.path()))
            .collect();
        files.sort();
        files
    }

    fn free_destination(&self, relative_path: &str) -> PathBuf {
        let mirrored = self.dir.join(relative_path);
        if !mirrored.exists() {
            return mirrored;
        }

        let stem = mirrored
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = mirrored
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let stamp = Utc::now().timestamp_millis();

        let mut attempt = 0u32;
        loop {
            let suffix = if attempt == 0 {
                stamp.to_string()
            } else {
                format!("{stamp}-{attempt}")
            };
            let candidate = mirrored.with_file_name(format!("{stem}.{suffix}{extension}"));
            if !candidate.exists() {
                return candidate;
            }
            attempt += 1;
        }
    }
}

// Cross-volume fallback. The copy is removed again if the source cannot be.
fn copy_verify_remove(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination)?;

    let verified = match (digest_file(source), digest_file(destination)) {
        (Ok(expected), Ok(actual)) if expected == actual => Ok(()),
        (Ok(_), Ok(_)) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "quarantine copy does not match its source",
        )),
        (Err(err), _) | (_, Err(err)) => Err(err),
    };
    if let Err(err) = verified {
        let _ = fs::remove_file(destination);
        return Err(err);
    }

    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(err);
    }
    Ok(())
}
