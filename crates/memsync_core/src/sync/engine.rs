//! Incremental sync pass from the source tree into the store.
//!
//! # Responsibility
//! - Enumerate eligible documents, skip unchanged ones, and upsert the rest.
//! - Quarantine conflicted documents instead of syncing them.
//! - Persist the ledger once at the end of the pass.
//!
//! # Invariants
//! - A per-file failure is counted and logged; it never aborts the pass.
//! - Only store-open and ledger-persist failures are fatal.
//! - Ledger records move only for files whose upsert succeeded.
//! - A path stays bound to one entity id, even if that entity was deleted
//!   externally in the meantime.
//! - Without a ledger record, a path binds to the entity already mirrored
//!   from it before a new one is created.

use super::document::{parse_document, NormalizedDocument, ParseOutcome, SOURCE_TAG};
use super::error::{FileFailure, SyncError, SyncErrorKind};
use super::hasher::{digest_bytes, has_changed};
use super::ledger::Ledger;
use super::quarantine::Quarantine;
use super::scanner::{scan_sources, SourceFile};
use crate::config::SyncConfig;
use crate::db::open_db;
use crate::model::entity::Entity;
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::repo::{RepoError, RepoResult};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Counters and failures of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files that were parsed or attempted: `succeeded + failed + quarantined`.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub quarantined: usize,
    /// Unchanged files; not part of `processed`.
    pub skipped: usize,
    pub errors: Vec<FileFailure>,
    pub duration_ms: u64,
}

/// Caller-facing result shape of a full sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub success: bool,
    pub processed: usize,
    pub errors: usize,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            success: self.success(),
            processed: self.processed,
            errors: self.failed,
        }
    }

    /// `0` for a clean pass, `1` when some files failed.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    fn record_failure(&mut self, failure: FileFailure) {
        self.processed += 1;
        self.failed += 1;
        self.errors.push(failure);
    }
}

#[derive(Debug)]
enum FileOutcome {
    Unchanged,
    Synced { entity_id: String, recreated: bool },
    Quarantined(PathBuf),
}

/// Runs sync passes against one store handle.
pub struct SyncEngine<'cfg, R: EntityRepository> {
    repo: R,
    config: &'cfg SyncConfig,
    quarantine: Quarantine,
}

impl<'cfg, R: EntityRepository> SyncEngine<'cfg, R> {
    pub fn new(repo: R, config: &'cfg SyncConfig) -> Self {
        Self {
            repo,
            config,
            quarantine: Quarantine::from_config(config),
        }
    }

    /// Runs one best-effort pass over every eligible document.
    ///
    /// # Errors
    /// - `LedgerPersist` when the ledger cannot be written at the end of the
    ///   pass. Store mutations made during the pass are kept; the next pass
    ///   re-detects the same changes and converges.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let mut ledger = Ledger::load(&self.config.ledger_path);
        let scan = scan_sources(self.config);
        let mut report = SyncReport::default();

        info!(
            "event=sync_pass module=sync status=start root={} files={} ledger_records={}",
            self.config.source_root.display(),
            scan.files.len(),
            ledger.len()
        );

        for issue in &scan.issues {
            report.record_failure(FileFailure {
                path: issue
                    .path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
                kind: SyncErrorKind::Io,
                message: issue.message.clone(),
            });
        }

        for file in &scan.files {
            match self.sync_file(file, &mut ledger) {
                Ok(FileOutcome::Unchanged) => {
                    report.skipped += 1;
                    debug!(
                        "event=sync_file module=sync status=skipped path={}",
                        file.relative
                    );
                }
                Ok(FileOutcome::Synced {
                    entity_id,
                    recreated,
                }) => {
                    report.processed += 1;
                    report.succeeded += 1;
                    info!(
                        "event=sync_file module=sync status=ok path={} entity_id={} recreated={}",
                        file.relative, entity_id, recreated
                    );
                }
                Ok(FileOutcome::Quarantined(destination)) => {
                    report.processed += 1;
                    report.quarantined += 1;
                    warn!(
                        "event=sync_file module=sync status=quarantined path={} destination={}",
                        file.relative,
                        destination.display()
                    );
                }
                Err(err) => {
                    error!(
                        "event=sync_file module=sync status=error kind={} path={} error={}",
                        err.kind().as_str(),
                        file.relative,
                        crate::logging::single_line(&err.to_string(), 300)
                    );
                    report.record_failure(FileFailure::from(&err));
                }
            }
        }

        ledger.save().map_err(|source| {
            error!(
                "event=sync_pass module=sync status=fatal path={} error={}",
                ledger.path().display(),
                source
            );
            SyncError::LedgerPersist {
                path: ledger.path().to_path_buf(),
                source,
            }
        })?;

        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "event=sync_pass module=sync status=done processed={} succeeded={} failed={} quarantined={} skipped={} duration_ms={}",
            report.processed,
            report.succeeded,
            report.failed,
            report.quarantined,
            report.skipped,
            report.duration_ms
        );
        Ok(report)
    }

    fn sync_file(&self, file: &SourceFile, ledger: &mut Ledger) -> Result<FileOutcome, SyncError> {
        let io_error = |source: std::io::Error| SyncError::Io {
            path: file.relative.clone(),
            source,
        };

        if !has_changed(&file.path, &file.relative, ledger).map_err(io_error)? {
            return Ok(FileOutcome::Unchanged);
        }

        // Stamped before the read: an edit racing the read must never look
        // older than `last_synced`.
        let synced_at = Utc::now();
        // The recorded digest must describe exactly the bytes that were parsed.
        let bytes = fs::read(&file.path).map_err(io_error)?;
        let digest = digest_bytes(&bytes);
        let content = String::from_utf8(bytes).map_err(|_| SyncError::InvalidUtf8 {
            path: file.relative.clone(),
        })?;

        let document = match parse_document(&file.relative, &content, synced_at) {
            ParseOutcome::Document(document) => document,
            ParseOutcome::Conflict => {
                let destination = self
                    .quarantine
                    .quarantine(&file.path, &file.relative)
                    .map_err(|source| SyncError::Quarantine {
                        path: file.relative.clone(),
                        source,
                    })?;
                return Ok(FileOutcome::Quarantined(destination));
            }
        };

        let bound_id = ledger
            .get(&file.relative)
            .map(|record| record.entity_id.clone());
        let (entity, recreated) = self
            .upsert(&file.relative, &document, bound_id)
            .map_err(|source| SyncError::Store {
                path: file.relative.clone(),
                source,
            })?;

        ledger.record(file.relative.as_str(), digest, entity.id.as_str(), synced_at);
        Ok(FileOutcome::Synced {
            entity_id: entity.id,
            recreated,
        })
    }

    /// Updates the bound entity, re-creating it under the same id when it
    /// was deleted. An unbound path first rebinds to the entity the store
    /// already mirrors from it (lost or corrupt ledger, interrupted pass);
    /// only a path the store has never seen gets a fresh entity.
    fn upsert(
        &self,
        relative: &str,
        document: &NormalizedDocument,
        bound_id: Option<String>,
    ) -> RepoResult<(Entity, bool)> {
        let Some(id) = bound_id else {
            if let Some(existing) = self.repo.find_by_source_path(SOURCE_TAG, relative)? {
                info!(
                    "event=sync_upsert module=sync status=rebind path={} entity_id={}",
                    relative, existing.id
                );
                let entity = self.repo.update_entity(&existing.id, &document.to_patch())?;
                return Ok((entity, false));
            }
            return Ok((self.repo.create_entity(document.to_new_entity(None))?, false));
        };

        match self.repo.update_entity(&id, &document.to_patch()) {
            Ok(entity) => Ok((entity, false)),
            Err(RepoError::EntityNotFound(_)) => {
                warn!(
                    "event=sync_upsert module=sync status=recreate path={} entity_id={}",
                    relative, id
                );
                let entity = self.repo.create_entity(document.to_new_entity(Some(id)))?;
                Ok((entity, true))
            }
            Err(err) => Err(err),
        }
    }
}

/// Opens the configured store and runs one pass.
///
/// # Errors
/// - `StoreOpen` when the store cannot be opened or migrated.
/// - `LedgerPersist` when the ledger cannot be written.
pub fn run_full_sync(config: &SyncConfig) -> Result<SyncReport, SyncError> {
    let conn = open_db(&config.database_path).map_err(|err| {
        error!(
            "event=sync_pass module=sync status=fatal path={} error={}",
            config.database_path.display(),
            err
        );
        SyncError::StoreOpen(err)
    })?;
    SyncEngine::new(SqliteEntityRepository::new(&conn), config).run()
}

#[cfg(test)]
mod tests {
    use super::SyncReport;
    use crate::sync::error::{FileFailure, SyncErrorKind};

    #[test]
    fn report_summary_counts_failures_as_errors() {
        let mut report = SyncReport {
            processed: 2,
            succeeded: 2,
            ..SyncReport::default()
        };
        assert!(report.success());
        assert_eq!(report.exit_code(), 0);

        report.record_failure(FileFailure {
            path: "x.md".to_string(),
            kind: SyncErrorKind::Malformed,
            message: "bad".to_string(),
        });
        let summary = report.summary();
        assert!(!summary.success);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.errors, 1);
        assert_eq!(report.exit_code(), 1);
    }
}
