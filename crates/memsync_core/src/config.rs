//! Explicit configuration for sync passes, audits, and logging.
//!
//! # Invariants
//! - The quarantine directory always lives directly under `source_root`.
//! - Configuration is passed by value or reference; nothing is global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_QUARANTINE_DIR: &str = "_conflicts";
pub const DEFAULT_EXTENSION: &str = "md";
const SOURCE_DIR: &str = "memory-bank";
const LOG_DIR: &str = "logs";
const LEDGER_FILE: &str = ".sync_state.json";
const DATABASE_FILE: &str = "memory.db";

/// Locations and filters for one source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root of the human-editable document tree.
    pub source_root: PathBuf,
    /// Name of the reserved subdirectory under `source_root`.
    pub quarantine_dir_name: String,
    /// JSON ledger location.
    pub ledger_path: PathBuf,
    /// SQLite store location.
    pub database_path: PathBuf,
    /// Eligible file extensions, without the leading dot.
    pub extensions: Vec<String>,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
}

impl SyncConfig {
    /// Builds the conventional layout rooted at `workspace`:
    ///
    /// ```text
    /// workspace/
    ///   memory-bank/            source tree
    ///     _conflicts/           quarantine
    ///     memory.db             store
    ///   logs/
    ///     .sync_state.json      ledger
    /// ```
    pub fn for_workspace(workspace: impl AsRef<Path>) -> Self {
        let workspace = workspace.as_ref();
        let source_root = workspace.join(SOURCE_DIR);
        let log_dir = workspace.join(LOG_DIR);
        Self {
            database_path: source_root.join(DATABASE_FILE),
            ledger_path: log_dir.join(LEDGER_FILE),
            source_root,
            quarantine_dir_name: DEFAULT_QUARANTINE_DIR.to_string(),
            extensions: vec![DEFAULT_EXTENSION.to_string()],
            log_dir,
        }
    }

    /// Absolute path of the quarantine directory.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.source_root.join(&self.quarantine_dir_name)
    }

    /// Case-insensitive extension check.
    pub fn is_eligible_extension(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Logger settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Must be absolute.
    pub log_dir: PathBuf,
    /// Mirror `info` and above to stderr.
    pub duplicate_to_stderr: bool,
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: default_log_level().to_string(),
            log_dir: log_dir.into(),
            duplicate_to_stderr: false,
        }
    }
}

/// Default log level for the current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}
