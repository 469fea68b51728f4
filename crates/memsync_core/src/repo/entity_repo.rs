//! Entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Create, read, update, delete, and search entities.
//! - Own the cascade that removes touching relations before an entity row.
//!
//! # Invariants
//! - Write paths call `Entity::validate()` before SQL mutations.
//! - Updates merge metadata and never move `updated_at` backwards.
//! - Search ordering is `updated_at DESC, id ASC`.
//! - Source lookups resolve to the oldest matching row, so a path that was
//!   ever mirrored twice keeps converging on its first entity.

use super::{begin_write, decode_map, encode_map, RepoError, RepoResult};
use crate::model::entity::{Entity, EntityPatch, NewEntity};
use crate::model::now_ms;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    type,
    name,
    content,
    metadata,
    created_at,
    updated_at
FROM entities";

const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Substring search options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySearchQuery {
    /// Matched as a substring of `name` or `content`. Empty matches everything.
    pub text: String,
    /// Optional exact type filter.
    pub kind: Option<String>,
    /// Maximum rows returned. `0` returns nothing.
    pub limit: u32,
}

impl EntitySearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Repository interface for entity operations.
pub trait EntityRepository {
    /// Persists a new entity and returns the materialized record.
    ///
    /// Fails with `DuplicateEntity` when the requested id is taken.
    fn create_entity(&self, new_entity: NewEntity) -> RepoResult<Entity>;
    /// Loads one entity; `None` when absent.
    fn get_entity(&self, id: &str) -> RepoResult<Option<Entity>>;
    /// Applies a partial update; `EntityNotFound` when absent.
    fn update_entity(&self, id: &str, patch: &EntityPatch) -> RepoResult<Entity>;
    /// Deletes one entity and every relation touching it.
    ///
    /// Returns `false` when nothing was deleted.
    fn delete_entity(&self, id: &str) -> RepoResult<bool>;
    /// Substring search over name and content, newest first.
    fn search_entities(&self, query: &EntitySearchQuery) -> RepoResult<Vec<Entity>>;
    /// Finds the entity mirrored from `file_path` by the `source` importer,
    /// as recorded in its `source` and `file_path` metadata keys.
    fn find_by_source_path(&self, source: &str, file_path: &str) -> RepoResult<Option<Entity>>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn create_entity(&self, new_entity: NewEntity) -> RepoResult<Entity> {
        let entity = new_entity.into_entity(now_ms());
        entity.validate()?;
        let metadata = encode_map(&entity.metadata, "entities.metadata")?;

        let tx = begin_write(self.conn)?;
        if entity_exists(&tx, &entity.id)? {
            return Err(RepoError::DuplicateEntity(entity.id));
        }

        tx.execute(
            "INSERT INTO entities (
                id,
                type,
                name,
                content,
                metadata,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                entity.id.as_str(),
                entity.kind.as_str(),
                entity.name.as_str(),
                entity.content.as_str(),
                metadata,
                entity.created_at,
                entity.updated_at,
            ],
        )?;
        tx.commit()?;

        debug!(
            "event=entity_create module=repo status=ok entity_id={} type={}",
            entity.id, entity.kind
        );
        Ok(entity)
    }

    fn get_entity(&self, id: &str) -> RepoResult<Option<Entity>> {
        load_entity(self.conn, id)
    }

    fn update_entity(&self, id: &str, patch: &EntityPatch) -> RepoResult<Entity> {
        let tx = begin_write(self.conn)?;
        let Some(mut entity) = load_entity(&tx, id)? else {
            return Err(RepoError::EntityNotFound(id.to_string()));
        };

        entity.apply_patch(patch, now_ms());
        entity.validate()?;
        let metadata = encode_map(&entity.metadata, "entities.metadata")?;

        tx.execute(
            "UPDATE entities
             SET
                type = ?1,
                name = ?2,
                content = ?3,
                metadata = ?4,
                updated_at = ?5
             WHERE id = ?6;",
            params![
                entity.kind.as_str(),
                entity.name.as_str(),
                entity.content.as_str(),
                metadata,
                entity.updated_at,
                entity.id.as_str(),
            ],
        )?;
        tx.commit()?;

        Ok(entity)
    }

    fn delete_entity(&self, id: &str) -> RepoResult<bool> {
        let tx = begin_write(self.conn)?;
        let relations_removed = tx.execute(
            "DELETE FROM relations WHERE source_id = ?1 OR target_id = ?1;",
            [id],
        )?;
        let removed = tx.execute("DELETE FROM entities WHERE id = ?1;", [id])?;
        tx.commit()?;

        if removed > 0 {
            debug!(
                "event=entity_delete module=repo status=ok entity_id={} relations_removed={}",
                id, relations_removed
            );
        }
        Ok(removed > 0)
    }

    fn search_entities(&self, query: &EntitySearchQuery) -> RepoResult<Vec<Entity>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(&query.text));
        let mut sql = format!(
            "{ENTITY_SELECT_SQL}
             WHERE (name LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\')"
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(pattern)];

        if let Some(kind) = query.kind.as_ref() {
            sql.push_str(" AND type = ?2");
            bind_values.push(Value::Text(kind.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC LIMIT ?");
        sql.push_str(&(bind_values.len() + 1).to_string());
        bind_values.push(Value::Integer(i64::from(query.limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }

        Ok(entities)
    }

    fn find_by_source_path(&self, source: &str, file_path: &str) -> RepoResult<Option<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTITY_SELECT_SQL}
             WHERE json_extract(metadata, '$.source') = ?1
               AND json_extract(metadata, '$.file_path') = ?2
             ORDER BY created_at ASC, id ASC
             LIMIT 1;"
        ))?;
        let row = stmt
            .query_row([source, file_path], |row| Ok(parse_entity_row(row)))
            .optional()?;
        row.transpose()
    }
}

/// Returns whether an entity row with `id` exists.
pub(crate) fn entity_exists(conn: &Connection, id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_entity(conn: &Connection, id: &str) -> RepoResult<Option<Entity>> {
    let mut stmt = conn.prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id], |row| Ok(parse_entity_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<Entity> {
    let metadata_text: String = row.get("metadata")?;
    let entity = Entity {
        id: row.get("id")?,
        kind: row.get("type")?,
        name: row.get("name")?,
        content: row.get("content")?,
        metadata: decode_map(&metadata_text, "entities.metadata")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    entity.validate()?;
    Ok(entity)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
