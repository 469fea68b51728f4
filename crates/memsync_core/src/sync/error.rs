use super::ledger::LedgerError;
use crate::db::DbError;
use crate::repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

/// Coarse classification shared by logs, reports, and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    NotFound,
    Conflict,
    Malformed,
    Io,
    Fatal,
}

impl SyncErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Malformed => "malformed",
            Self::Io => "io",
            Self::Fatal => "fatal",
        }
    }
}

#[derive(Debug)]
pub enum SyncError {
    /// Source file could not be read.
    Io { path: String, source: io::Error },
    InvalidUtf8 { path: String },
    /// Upsert rejected by the store.
    Store { path: String, source: RepoError },
    /// Conflicted file could not be moved aside.
    Quarantine { path: String, source: io::Error },
    StoreOpen(DbError),
    LedgerPersist { path: PathBuf, source: LedgerError },
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Io { .. } | Self::Quarantine { .. } => SyncErrorKind::Io,
            Self::InvalidUtf8 { .. } => SyncErrorKind::Malformed,
            Self::Store { source, .. } if source.is_not_found() => SyncErrorKind::NotFound,
            Self::Store { source, .. } if source.is_conflict() => SyncErrorKind::Conflict,
            Self::Store {
                source: RepoError::Validation(_) | RepoError::InvalidData(_),
                ..
            } => SyncErrorKind::Malformed,
            Self::Store { .. } => SyncErrorKind::Io,
            Self::StoreOpen(_) | Self::LedgerPersist { .. } => SyncErrorKind::Fatal,
        }
    }

    /// True when the whole pass must abort.
    pub fn is_fatal(&self) -> bool {
        self.kind() == SyncErrorKind::Fatal
    }

    /// Relative source path for per-file errors.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Io { path, .. }
            | Self::InvalidUtf8 { path }
            | Self::Store { path, .. }
            | Self::Quarantine { path, .. } => Some(path),
            Self::StoreOpen(_) | Self::LedgerPersist { .. } => None,
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{path}`: {source}"),
            Self::InvalidUtf8 { path } => write!(f, "`{path}` is not valid UTF-8"),
            Self::Store { path, source } => write!(f, "store rejected `{path}`: {source}"),
            Self::Quarantine { path, source } => {
                write!(f, "cannot quarantine `{path}`: {source}")
            }
            Self::StoreOpen(err) => write!(f, "cannot open store: {err}"),
            Self::LedgerPersist { path, source } => {
                write!(f, "cannot persist ledger `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Quarantine { source, .. } => Some(source),
            Self::InvalidUtf8 { .. } => None,
            Self::Store { source, .. } => Some(source),
            Self::StoreOpen(err) => Some(err),
            Self::LedgerPersist { source, .. } => Some(source),
        }
    }
}

impl From<DbError> for SyncError {
    fn from(value: DbError) -> Self {
        Self::StoreOpen(value)
    }
}

/// One per-file failure recorded in a sync report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub kind: SyncErrorKind,
    pub message: String,
}

impl From<&SyncError> for FileFailure {
    fn from(value: &SyncError) -> Self {
        Self {
            path: value.path().unwrap_or_default().to_string(),
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FileFailure, SyncError, SyncErrorKind};
    use crate::db::DbError;
    use crate::repo::RepoError;

    #[test]
    fn store_errors_map_onto_taxonomy() {
        let missing = SyncError::Store {
            path: "a.md".to_string(),
            source: RepoError::EntityNotFound("e1".to_string()),
        };
        assert_eq!(missing.kind(), SyncErrorKind::NotFound);
        assert!(!missing.is_fatal());

        let duplicate = SyncError::Store {
            path: "a.md".to_string(),
            source: RepoError::DuplicateEntity("e1".to_string()),
        };
        assert_eq!(duplicate.kind(), SyncErrorKind::Conflict);

        let utf8 = SyncError::InvalidUtf8 {
            path: "b.md".to_string(),
        };
        assert_eq!(utf8.kind(), SyncErrorKind::Malformed);
    }

    #[test]
    fn only_store_open_and_ledger_persist_are_fatal() {
        let open = SyncError::from(DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 1,
        });
        assert!(open.is_fatal());
        assert_eq!(open.path(), None);

        let io = SyncError::Io {
            path: "c.md".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!io.is_fatal());

        let failure = FileFailure::from(&io);
        assert_eq!(failure.path, "c.md");
        assert_eq!(failure.kind, SyncErrorKind::Io);
        assert!(failure.message.starts_with("cannot read `c.md`"));
    }
}
