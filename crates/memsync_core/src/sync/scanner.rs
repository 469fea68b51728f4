//! Source tree enumeration shared by sync passes and audits.
//!
//! # Invariants
//! - The quarantine subtree is never descended into.
//! - Only regular files with an eligible extension are returned.
//! - Results are sorted by relative path; relative paths use `/`.

use crate::config::SyncConfig;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One eligible document under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Ledger key: path relative to the source root, `/`-separated.
    pub relative: String,
}

/// Directory entry that could not be inspected during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanIssue {
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub files: Vec<SourceFile>,
    pub issues: Vec<ScanIssue>,
}

/// Enumerates eligible documents. A missing source root yields an empty scan.
pub fn scan_sources(config: &SyncConfig) -> Scan {
    let root = config.source_root.as_path();
    if !root.is_dir() {
        return Scan::default();
    }

    let quarantine_dir = config.quarantine_dir();
    let mut scan = Scan::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.path() != quarantine_dir);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf);
                warn!(
                    "event=scan_entry module=scanner status=error path={} error={}",
                    path.as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    err
                );
                scan.issues.push(ScanIssue {
                    path,
                    message: err.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !config.is_eligible_extension(entry.path()) {
            continue;
        }

        match relative_key(root, entry.path()) {
            Some(relative) => scan.files.push(SourceFile {
                path: entry.into_path(),
                relative,
            }),
            None => scan.issues.push(ScanIssue {
                path: Some(entry.into_path()),
                message: "path is not valid UTF-8 or escapes the source root".to_string(),
            }),
        }
    }

    scan.files.sort_by(|a, b| a.relative.cmp(&b.relative));
    scan
}

/// `/`-joined path of `path` relative to `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::{relative_key, scan_sources};
    use crate::config::SyncConfig;
    use std::fs;
    use std::path::Path;

    #[test]
    fn scan_skips_quarantine_and_foreign_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::for_workspace(dir.path());
        let root = &config.source_root;
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::create_dir_all(config.quarantine_dir()).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("nested").join("a.MD"), "a").unwrap();
        fs::write(root.join("memory.db"), "db").unwrap();
        fs::write(config.quarantine_dir().join("c.md"), "c").unwrap();

        let scan = scan_sources(&config);
        let relatives: Vec<_> = scan.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(relatives, vec!["b.md", "nested/a.MD"]);
        assert!(scan.issues.is_empty());
    }

    #[test]
    fn missing_root_scans_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::for_workspace(dir.path().join("nope"));
        assert!(scan_sources(&config).files.is_empty());
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let root = Path::new("/ws/memory-bank");
        let path = root.join("x").join("y.md");
        assert_eq!(relative_key(root, &path).as_deref(), Some("x/y.md"));
        assert_eq!(relative_key(root, root), None);
    }
}
