//! Directed, typed edge between two entities.
//!
//! # Invariants
//! - Both endpoints exist when the relation is created.
//! - At most one relation exists per `(source_id, target_id, kind)`.

use super::entity::EntityId;
use super::Metadata;
use serde::{Deserialize, Serialize};

/// Store-assigned relation identifier.
pub type RelationId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Metadata,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Relation {
    /// Returns the endpoint opposite to `entity_id`, or `None` when the
    /// relation does not touch it.
    pub fn other_end(&self, entity_id: &str) -> Option<&str> {
        if self.source_id == entity_id {
            Some(self.target_id.as_str())
        } else if self.target_id == entity_id {
            Some(self.source_id.as_str())
        } else {
            None
        }
    }
}

/// Creation payload for [`Relation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Metadata,
}

impl NewRelation {
    pub fn new(
        source_id: impl Into<EntityId>,
        target_id: impl Into<EntityId>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind: kind.into(),
            properties: Metadata::new(),
        }
    }

    pub fn with_properties(mut self, properties: Metadata) -> Self {
        self.properties = properties;
        self
    }
}
