//! Relation repository contract and SQLite implementation.
//!
//! # Invariants
//! - Creation fails with `EntityNotFound` when either endpoint is missing.
//! - A repeated `(source_id, target_id, type)` triple is rejected with
//!   `DuplicateRelation`; it is never silently duplicated or upserted.
//! - Listing order is `created_at DESC, id DESC` (newest first).

use super::entity_repo::entity_exists;
use super::{begin_write, decode_map, encode_map, RepoError, RepoResult};
use crate::model::entity::EntityId;
use crate::model::now_ms;
use crate::model::relation::{NewRelation, Relation, RelationId};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const RELATION_SELECT_SQL: &str = "SELECT
    id,
    source_id,
    target_id,
    type,
    properties,
    created_at
FROM relations";

/// Filter for [`RelationRepository::get_relations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationQuery {
    /// Matches relations where this entity is either endpoint.
    pub entity_id: Option<EntityId>,
    /// Exact relation type filter.
    pub kind: Option<String>,
}

impl RelationQuery {
    pub fn for_entity(entity_id: impl Into<EntityId>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Repository interface for relation operations.
pub trait RelationRepository {
    fn create_relation(&self, new_relation: &NewRelation) -> RepoResult<Relation>;
    fn get_relation(&self, id: RelationId) -> RepoResult<Option<Relation>>;
    fn get_relations(&self, query: &RelationQuery) -> RepoResult<Vec<Relation>>;
    /// Returns `false` when no relation had this id.
    fn delete_relation(&self, id: RelationId) -> RepoResult<bool>;
}

/// SQLite-backed relation repository.
pub struct SqliteRelationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RelationRepository for SqliteRelationRepository<'_> {
    fn create_relation(&self, new_relation: &NewRelation) -> RepoResult<Relation> {
        let properties = encode_map(&new_relation.properties, "relations.properties")?;
        let created_at = now_ms();

        let tx = begin_write(self.conn)?;
        for endpoint in [&new_relation.source_id, &new_relation.target_id] {
            if !entity_exists(&tx, endpoint)? {
                return Err(RepoError::EntityNotFound(endpoint.clone()));
            }
        }

        let existing: Option<RelationId> = tx
            .query_row(
                "SELECT id FROM relations
                 WHERE source_id = ?1 AND target_id = ?2 AND type = ?3;",
                params![
                    new_relation.source_id.as_str(),
                    new_relation.target_id.as_str(),
                    new_relation.kind.as_str(),
                ],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(RepoError::DuplicateRelation {
                source_id: new_relation.source_id.clone(),
                target_id: new_relation.target_id.clone(),
                kind: new_relation.kind.clone(),
            });
        }

        tx.execute(
            "INSERT INTO relations (
                source_id,
                target_id,
                type,
                properties,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                new_relation.source_id.as_str(),
                new_relation.target_id.as_str(),
                new_relation.kind.as_str(),
                properties,
                created_at,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(
            "event=relation_create module=repo status=ok relation_id={} source_id={} target_id={} type={}",
            id, new_relation.source_id, new_relation.target_id, new_relation.kind
        );
        Ok(Relation {
            id,
            source_id: new_relation.source_id.clone(),
            target_id: new_relation.target_id.clone(),
            kind: new_relation.kind.clone(),
            properties: new_relation.properties.clone(),
            created_at,
        })
    }

    fn get_relation(&self, id: RelationId) -> RepoResult<Option<Relation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RELATION_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id], |row| Ok(parse_relation_row(row)))
            .optional()?;
        row.transpose()
    }

    fn get_relations(&self, query: &RelationQuery) -> RepoResult<Vec<Relation>> {
        let mut sql = format!("{RELATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(entity_id) = query.entity_id.as_ref() {
            bind_values.push(Value::Text(entity_id.clone()));
            let index = bind_values.len();
            sql.push_str(&format!(" AND (source_id = ?{index} OR target_id = ?{index})"));
        }

        if let Some(kind) = query.kind.as_ref() {
            bind_values.push(Value::Text(kind.clone()));
            sql.push_str(&format!(" AND type = ?{}", bind_values.len()));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut relations = Vec::new();
        while let Some(row) = rows.next()? {
            relations.push(parse_relation_row(row)?);
        }

        Ok(relations)
    }

    fn delete_relation(&self, id: RelationId) -> RepoResult<bool> {
        let tx = begin_write(self.conn)?;
        let removed = tx.execute("DELETE FROM relations WHERE id = ?1;", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

fn parse_relation_row(row: &Row<'_>) -> RepoResult<Relation> {
    let properties_text: String = row.get("properties")?;
    Ok(Relation {
        id: row.get("id")?,
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        kind: row.get("type")?,
        properties: decode_map(&properties_text, "relations.properties")?,
        created_at: row.get("created_at")?,
    })
}
