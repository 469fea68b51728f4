//! Core of memsync: an entity/relation store kept in step with a tree of
//! human-editable documents.
//! This crate owns every invariant; the CLI is wiring only.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{default_log_level, LoggingConfig, SyncConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{init_logging, logging_status};
pub use model::entity::{Entity, EntityId, EntityPatch, NewEntity};
pub use model::relation::{NewRelation, Relation, RelationId};
pub use model::Metadata;
pub use repo::entity_repo::{EntityRepository, EntitySearchQuery, SqliteEntityRepository};
pub use repo::relation_repo::{RelationQuery, RelationRepository, SqliteRelationRepository};
pub use repo::{RepoError, RepoResult};
pub use service::graph_service::{ContextNode, GraphService};
pub use sync::{
    run_full_sync, AuditExitCode, AuditReport, DriftAuditor, DriftStatus, SyncEngine, SyncError,
    SyncReport, SyncSummary,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
