//! Store: entity/relation persistence over SQLite.
//!
//! # Responsibility
//! - Provide CRUD, substring search, and relationship queries.
//! - Keep SQL details behind repository traits so callers receive a store
//!   handle instead of reaching for a shared global.
//!
//! # Invariants
//! - Every mutating call runs in exactly one transaction.
//! - Absent records are reported as `None`/`false` or a typed `NotFound`
//!   error, never as a silent success.

use crate::db::DbError;
use crate::model::entity::{EntityId, EntityValidationError};
use crate::model::relation::RelationId;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity_repo;
pub mod relation_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for entity and relation operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(EntityValidationError),
    EntityNotFound(EntityId),
    RelationNotFound(RelationId),
    DuplicateEntity(EntityId),
    DuplicateRelation {
        source_id: EntityId,
        target_id: EntityId,
        kind: String,
    },
    InvalidData(String),
}

impl RepoError {
    /// True for the "referenced record is absent" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound(_) | Self::RelationNotFound(_))
    }

    /// True for uniqueness violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateEntity(_) | Self::DuplicateRelation { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::EntityNotFound(id) => write!(f, "entity not found: {id}"),
            Self::RelationNotFound(id) => write!(f, "relation not found: {id}"),
            Self::DuplicateEntity(id) => write!(f, "entity already exists: {id}"),
            Self::DuplicateRelation {
                source_id,
                target_id,
                kind,
            } => write!(
                f,
                "relation already exists: {source_id} --[{kind}]--> {target_id}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Starts an immediate (write-locking) transaction on a shared connection.
pub(crate) fn begin_write(conn: &Connection) -> RepoResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}

pub(crate) fn encode_map(value: &crate::model::Metadata, column: &str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode {column}: {err}")))
}

pub(crate) fn decode_map(text: &str, column: &str) -> RepoResult<crate::model::Metadata> {
    if text.trim().is_empty() {
        return Ok(crate::model::Metadata::new());
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(crate::model::Metadata::new()),
        Ok(other) => Err(RepoError::InvalidData(format!(
            "{column} must be a JSON object, got `{other}`"
        ))),
        Err(err) => Err(RepoError::InvalidData(format!(
            "{column} is not valid JSON: {err}"
        ))),
    }
}
