//! File-to-store synchronization.
//!
//! # Responsibility
//! - Mirror a tree of human-edited documents into the entity store,
//!   incrementally and idempotently.
//! - Keep conflicted documents out of the store.
//! - Report drift between the tree and the last completed pass.
//!
//! # Invariants
//! - Change detection is content-based; drift reporting is time-based.
//! - Passes are not safe to run concurrently against the same ledger;
//!   callers serialize them.

pub mod audit;
pub mod document;
mod error;
pub mod engine;
pub mod hasher;
pub mod ledger;
pub mod quarantine;
pub mod scanner;

pub use audit::{AuditExitCode, AuditReport, DriftAuditor, DriftStatus, FileStatus};
pub use document::{parse_document, NormalizedDocument, ParseOutcome};
pub use engine::{run_full_sync, SyncEngine, SyncReport, SyncSummary};
pub use error::{FileFailure, SyncError, SyncErrorKind};
pub use ledger::{Ledger, LedgerError, LedgerOrigin, SyncRecord};
pub use quarantine::Quarantine;
