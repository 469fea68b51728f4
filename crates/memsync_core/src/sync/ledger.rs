//! Durable path -> {digest, last_synced, entity_id} map.
//!
//! # Responsibility
//! - Load the whole ledger into memory at the start of a pass.
//! - Persist it atomically once the pass completes.
//!
//! # Invariants
//! - A record's digest is the digest of the exact bytes last synced, not of
//!   whatever the file holds now.
//! - A missing, unreadable, or corrupt ledger loads as empty; it never aborts.
//! - Saving never leaves a half-written ledger at `path`.
//! - Records are never pruned implicitly.

use crate::model::entity::EntityId;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One successfully synced file, keyed by its relative path in [`Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Content digest, persisted as `hash`.
    #[serde(rename = "hash")]
    pub digest: String,
    #[serde(with = "iso_timestamp")]
    pub last_synced: DateTime<Utc>,
    pub entity_id: EntityId,
}

/// How the in-memory ledger was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOrigin {
    /// Parsed from an existing file.
    Loaded,
    /// No ledger file existed.
    Missing,
    /// The file existed but could not be read or decoded.
    Corrupt,
}

#[derive(Debug)]
pub enum LedgerError {
    Io { path: PathBuf, source: io::Error },
    Encode(serde_json::Error),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "ledger io failure at `{}`: {source}", path.display())
            }
            Self::Encode(err) => write!(f, "cannot encode ledger: {err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    origin: LedgerOrigin,
    records: BTreeMap<String, SyncRecord>,
}

impl Ledger {
    /// Creates an empty ledger that will be saved to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: LedgerOrigin::Missing,
            records: BTreeMap::new(),
        }
    }

    /// Loads the ledger at `path`, degrading to empty on any failure.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    "event=ledger_load module=ledger status=ok origin=missing path={}",
                    path.display()
                );
                return Self::empty(path);
            }
            Err(err) => {
                warn!(
                    "event=ledger_load module=ledger status=degraded origin=corrupt path={} error={}",
                    path.display(),
                    err
                );
                return Self::corrupt(path);
            }
        };

        match serde_json::from_str::<BTreeMap<String, SyncRecord>>(&raw) {
            Ok(records) => {
                info!(
                    "event=ledger_load module=ledger status=ok origin=loaded path={} records={}",
                    path.display(),
                    records.len()
                );
                Self {
                    path,
                    origin: LedgerOrigin::Loaded,
                    records,
                }
            }
            Err(err) => {
                warn!(
                    "event=ledger_load module=ledger status=degraded origin=corrupt path={} error={}",
                    path.display(),
                    err
                );
                Self::corrupt(path)
            }
        }
    }

    fn corrupt(path: PathBuf) -> Self {
        Self {
            path,
            origin: LedgerOrigin::Corrupt,
            records: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> LedgerOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, relative_path: &str) -> Option<&SyncRecord> {
        self.records.get(relative_path)
    }

    /// Iterates records in relative-path order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &SyncRecord)> {
        self.records
            .iter()
            .map(|(path, record)| (path.as_str(), record))
    }

    /// Overwrites the record for `relative_path`.
    pub fn record(
        &mut self,
        relative_path: impl Into<String>,
        digest: impl Into<String>,
        entity_id: impl Into<EntityId>,
        last_synced: DateTime<Utc>,
    ) {
        self.records.insert(
            relative_path.into(),
            SyncRecord {
                digest: digest.into(),
                last_synced,
                entity_id: entity_id.into(),
            },
        );
    }

    /// Relative paths whose file no longer exists under `source_root`.
    pub fn orphaned(&self, source_root: &Path) -> Vec<String> {
        self.records
            .keys()
            .filter(|relative| !source_root.join(relative.as_str()).is_file())
            .cloned()
            .collect()
    }

    /// Drops records for files no longer present under `source_root`.
    ///
    /// Sync passes never call this; it is an explicit maintenance step.
    pub fn prune_missing(&mut self, source_root: &Path) -> Vec<String> {
        let orphaned = self.orphaned(source_root);
        for relative in &orphaned {
            self.records.remove(relative);
        }
        orphaned
    }

    /// Writes the ledger via temp file + rename in the destination directory.
    pub fn save(&self) -> Result<(), LedgerError> {
        let encoded = serde_json::to_vec_pretty(&self.records).map_err(LedgerError::Encode)?;
        write_atomic(&self.path, &encoded).map_err(|(path, source)| LedgerError::Io { path, source })
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), (PathBuf, io::Error)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| (parent.to_path_buf(), err))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let written = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err((temp_path, err));
    }

    fs::rename(&temp_path, path).map_err(|err| {
        let _ = fs::remove_file(&temp_path);
        (path.to_path_buf(), err)
    })
}

/// RFC 3339 on write; accepts offset-less ISO-8601 (read as UTC) on load.
mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|err| serde::de::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{Ledger, LedgerOrigin};
    use chrono::{TimeZone, Utc};
    use std::fs;

    #[test]
    fn save_then_load_preserves_records_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join(".sync_state.json");
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut ledger = Ledger::load(&path);
        assert_eq!(ledger.origin(), LedgerOrigin::Missing);
        ledger.record("notes/a.md", "abc123", "ent-1", at);
        ledger.save().unwrap();

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let loaded = Ledger::load(&path);
        assert_eq!(loaded.origin(), LedgerOrigin::Loaded);
        let record = loaded.get("notes/a.md").unwrap();
        assert_eq!(record.digest, "abc123");
        assert_eq!(record.entity_id, "ent-1");
        assert_eq!(record.last_synced, at);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"hash\": \"abc123\""));
        assert!(raw.contains("2026-03-01T12:00:00Z"));
    }

    #[test]
    fn corrupt_ledger_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, "{ not json").unwrap();

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.origin(), LedgerOrigin::Corrupt);
        assert!(ledger.is_empty());
    }

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"{"a.md": {"hash": "h", "last_synced": "2025-05-01T08:30:15.250000", "entity_id": "ent_1"}}"#,
        )
        .unwrap();

        let ledger = Ledger::load(&path);
        let record = ledger.get("a.md").unwrap();
        assert_eq!(
            record.last_synced,
            Utc.with_ymd_and_hms(2025, 5, 1, 8, 30, 15).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn prune_missing_only_drops_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("kept.md"), "x").unwrap();
        let mut ledger = Ledger::empty(dir.path().join("ledger.json"));
        ledger.record("kept.md", "h1", "e1", Utc::now());
        ledger.record("gone.md", "h2", "e2", Utc::now());

        assert_eq!(ledger.orphaned(dir.path()), vec!["gone.md".to_string()]);
        assert_eq!(ledger.prune_missing(dir.path()), vec!["gone.md".to_string()]);
        assert!(ledger.get("kept.md").is_some());
        assert_eq!(ledger.len(), 1);
    }
}
