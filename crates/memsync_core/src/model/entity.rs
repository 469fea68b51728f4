//! Entity record and its create/update payloads.
//!
//! # Invariants
//! - `id` is stable and unique; it is never reassigned after creation.
//! - `updated_at` never moves backwards.
//! - Updates merge `metadata` key-by-key instead of replacing it.

use super::Metadata;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable entity identifier.
///
/// Kept as plain text so ids minted by other tools (and bound in an existing
/// sync ledger) remain usable.
pub type EntityId = String;

pub const DEFAULT_ENTITY_TYPE: &str = "document";
pub const DEFAULT_ENTITY_NAME: &str = "Unnamed Entity";

/// Stored graph node representing a document or concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// Category tag, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub content: String,
    pub metadata: Metadata,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Entity {
    /// Applies a partial update in memory.
    ///
    /// Scalar fields present in `patch` overwrite, metadata keys are merged,
    /// and `updated_at` becomes `max(updated_at, now_ms)`.
    pub fn apply_patch(&mut self, patch: &EntityPatch, now_ms: i64) {
        if let Some(kind) = patch.kind.as_ref() {
            self.kind = kind.clone();
        }
        if let Some(name) = patch.name.as_ref() {
            self.name = name.clone();
        }
        if let Some(content) = patch.content.as_ref() {
            self.content = content.clone();
        }
        if let Some(metadata) = patch.metadata.as_ref() {
            merge_metadata(&mut self.metadata, metadata);
        }
        self.updated_at = self.updated_at.max(now_ms);
    }

    /// Checks invariants that must hold before the record is persisted.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.id.trim().is_empty() {
            return Err(EntityValidationError::BlankId);
        }
        if self.kind.trim().is_empty() {
            return Err(EntityValidationError::BlankType);
        }
        if self.updated_at < self.created_at {
            return Err(EntityValidationError::UpdatedBeforeCreated {
                created_at: self.created_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }
}

/// Creation payload. Every field except `metadata` may be left to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    /// Caller-chosen id; a UUID v4 is generated when absent.
    pub id: Option<EntityId>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewEntity {
    /// Materializes the payload into a full record stamped with `now_ms`.
    pub fn into_entity(self, now_ms: i64) -> Entity {
        Entity {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: self
                .kind
                .unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string()),
            name: self
                .name
                .unwrap_or_else(|| DEFAULT_ENTITY_NAME.to_string()),
            content: self.content.unwrap_or_default(),
            metadata: self.metadata,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}

/// Partial update payload. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub content: Option<String>,
    /// Keys merged into the stored metadata.
    pub metadata: Option<Metadata>,
}

impl From<NewEntity> for EntityPatch {
    fn from(value: NewEntity) -> Self {
        Self {
            kind: value.kind,
            name: value.name,
            content: value.content,
            metadata: Some(value.metadata),
        }
    }
}

/// Shallow merge: keys in `incoming` overwrite keys in `target`.
pub fn merge_metadata(target: &mut Metadata, incoming: &Metadata) {
    for (key, value) in incoming {
        target.insert(key.clone(), value.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    BlankId,
    BlankType,
    UpdatedBeforeCreated { created_at: i64, updated_at: i64 },
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "entity id must not be blank"),
            Self::BlankType => write!(f, "entity type must not be blank"),
            Self::UpdatedBeforeCreated {
                created_at,
                updated_at,
            } => write!(
                f,
                "entity updated_at {updated_at} is earlier than created_at {created_at}"
            ),
        }
    }
}

impl Error for EntityValidationError {}

#[cfg(test)]
mod tests {
    use super::{EntityPatch, EntityValidationError, NewEntity, DEFAULT_ENTITY_TYPE};
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> super::Metadata {
        value.as_object().cloned().expect("fixture must be an object")
    }

    #[test]
    fn new_entity_fills_defaults() {
        let entity = NewEntity::default().into_entity(42);
        assert!(!entity.id.is_empty());
        assert_eq!(entity.kind, DEFAULT_ENTITY_TYPE);
        assert_eq!(entity.name, "Unnamed Entity");
        assert_eq!(entity.content, "");
        assert_eq!(entity.created_at, 42);
        assert_eq!(entity.updated_at, 42);
    }

    #[test]
    fn patch_merges_metadata_and_keeps_untouched_fields() {
        let mut entity = NewEntity {
            name: Some("plan".to_string()),
            metadata: metadata(json!({"author": "a", "tags": ["x"]})),
            ..NewEntity::default()
        }
        .into_entity(100);

        entity.apply_patch(
            &EntityPatch {
                content: Some("body".to_string()),
                metadata: Some(metadata(json!({"author": "b", "status": "draft"}))),
                ..EntityPatch::default()
            },
            200,
        );

        assert_eq!(entity.name, "plan");
        assert_eq!(entity.content, "body");
        assert_eq!(entity.metadata["author"], "b");
        assert_eq!(entity.metadata["tags"], json!(["x"]));
        assert_eq!(entity.metadata["status"], "draft");
        assert_eq!(entity.updated_at, 200);
    }

    #[test]
    fn patch_never_moves_updated_at_backwards() {
        let mut entity = NewEntity::default().into_entity(500);
        entity.apply_patch(&EntityPatch::default(), 100);
        assert_eq!(entity.updated_at, 500);
    }

    #[test]
    fn validate_rejects_blank_type() {
        let mut entity = NewEntity::default().into_entity(1);
        entity.kind = "  ".to_string();
        assert_eq!(entity.validate(), Err(EntityValidationError::BlankType));
    }
}
