//! Read-only drift audit between the source tree and the ledger.
//!
//! # Invariants
//! - The auditor never writes to the store, the ledger, or the source tree.
//! - Drift compares modification time to `last_synced`, both in UTC.
//! - Orphaned ledger records are reported but never affect the exit code.

use super::ledger::{Ledger, LedgerOrigin};
use super::scanner::scan_sources;
use crate::config::SyncConfig;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Serialize, Serializer};
use std::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    /// No ledger record for this path.
    NeverSynced,
    /// Modified after `last_synced`, or modification time unavailable.
    OutOfSync,
    Synced,
}

impl DriftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NeverSynced => "never_synced",
            Self::OutOfSync => "out_of_sync",
            Self::Synced => "synced",
        }
    }
}

/// Process exit classification of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditExitCode {
    InSync = 0,
    Drift = 1,
    /// Ledger missing, corrupt, or empty; drift cannot be assessed.
    NoLedger = 2,
}

impl AuditExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Serialize for AuditExitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub path: String,
    pub status: DriftStatus,
    pub modified: Option<DateTime<Utc>>,
    pub last_synced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub files: Vec<FileStatus>,
    pub synced: usize,
    pub out_of_sync: usize,
    pub never_synced: usize,
    /// Ledger paths whose file no longer exists.
    pub orphaned: Vec<String>,
    /// Most recent `last_synced` across the ledger.
    pub last_sync: Option<DateTime<Utc>>,
    pub ledger: LedgerOrigin,
    pub exit_code: AuditExitCode,
}

impl AuditReport {
    pub fn total(&self) -> usize {
        self.files.len()
    }
}

pub struct DriftAuditor<'cfg> {
    config: &'cfg SyncConfig,
}

impl<'cfg> DriftAuditor<'cfg> {
    pub fn new(config: &'cfg SyncConfig) -> Self {
        Self { config }
    }

    /// Classifies every current source file against the ledger.
    pub fn check(&self) -> AuditReport {
        let ledger = Ledger::load(&self.config.ledger_path);
        let scan = scan_sources(self.config);

        let mut files = Vec::with_capacity(scan.files.len());
        let (mut synced, mut out_of_sync, mut never_synced) = (0, 0, 0);
        for file in &scan.files {
            let modified = match fs::metadata(&file.path).and_then(|meta| meta.modified()) {
                Ok(time) => Some(DateTime::<Utc>::from(time)),
                Err(err) => {
                    warn!(
                        "event=audit_file module=audit status=degraded path={} error={}",
                        file.relative, err
                    );
                    None
                }
            };
            let last_synced = ledger.get(&file.relative).map(|record| record.last_synced);
            let status = classify(modified, last_synced);
            match status {
                DriftStatus::Synced => synced += 1,
                DriftStatus::OutOfSync => out_of_sync += 1,
                DriftStatus::NeverSynced => never_synced += 1,
            }
            files.push(FileStatus {
                path: file.relative.clone(),
                status,
                modified,
                last_synced,
            });
        }

        let exit_code = if ledger.origin() != LedgerOrigin::Loaded || ledger.is_empty() {
            AuditExitCode::NoLedger
        } else if out_of_sync + never_synced > 0 {
            AuditExitCode::Drift
        } else {
            AuditExitCode::InSync
        };

        let report = AuditReport {
            files,
            synced,
            out_of_sync,
            never_synced,
            orphaned: ledger.orphaned(&self.config.source_root),
            last_sync: ledger.records().map(|(_, record)| record.last_synced).max(),
            ledger: ledger.origin(),
            exit_code,
        };
        info!(
            "event=audit module=audit status=done files={} synced={} out_of_sync={} never_synced={} orphaned={} exit_code={}",
            report.total(),
            report.synced,
            report.out_of_sync,
            report.never_synced,
            report.orphaned.len(),
            report.exit_code.code()
        );
        report
    }
}

fn classify(modified: Option<DateTime<Utc>>, last_synced: Option<DateTime<Utc>>) -> DriftStatus {
    match (modified, last_synced) {
        (_, None) => DriftStatus::NeverSynced,
        (Some(modified), Some(last_synced)) if modified <= last_synced => DriftStatus::Synced,
        _ => DriftStatus::OutOfSync,
    }
}
