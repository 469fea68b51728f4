//! Relationship traversal around one entity.
//!
//! # Responsibility
//! - Collect the neighbourhood of an entity up to a bounded depth.
//!
//! # Invariants
//! - Traversal is an explicit breadth-first worklist; no recursion.
//! - Every entity is visited at most once, so cyclic graphs terminate.
//! - Relations are followed in both directions.

use crate::model::entity::Entity;
use crate::repo::entity_repo::EntityRepository;
use crate::repo::relation_repo::{RelationQuery, RelationRepository};
use crate::repo::{RepoError, RepoResult};
use std::collections::{HashSet, VecDeque};

/// One entity reached during traversal with its hop distance from the root.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextNode {
    pub entity: Entity,
    pub depth: u32,
}

/// Read-only graph queries spanning entities and relations.
pub struct GraphService<E: EntityRepository, R: RelationRepository> {
    entities: E,
    relations: R,
}

impl<E: EntityRepository, R: RelationRepository> GraphService<E, R> {
    pub fn new(entities: E, relations: R) -> Self {
        Self {
            entities,
            relations,
        }
    }

    /// Returns the root and every entity within `max_depth` hops, in
    /// breadth-first order.
    ///
    /// Relations pointing at entities that no longer exist are skipped.
    ///
    /// # Errors
    /// - `EntityNotFound` when the root does not exist.
    pub fn neighborhood(&self, root_id: &str, max_depth: u32) -> RepoResult<Vec<ContextNode>> {
        let root = self
            .entities
            .get_entity(root_id)?
            .ok_or_else(|| RepoError::EntityNotFound(root_id.to_string()))?;

        let mut visited = HashSet::from([root.id.clone()]);
        let mut worklist = VecDeque::from([ContextNode {
            entity: root,
            depth: 0,
        }]);
        let mut reached = Vec::new();

        while let Some(node) = worklist.pop_front() {
            if node.depth < max_depth {
                let relations = self
                    .relations
                    .get_relations(&RelationQuery::for_entity(node.entity.id.as_str()))?;
                for relation in &relations {
                    let Some(other_id) = relation.other_end(&node.entity.id) else {
                        continue;
                    };
                    if !visited.insert(other_id.to_string()) {
                        continue;
                    }
                    if let Some(entity) = self.entities.get_entity(other_id)? {
                        worklist.push_back(ContextNode {
                            entity,
                            depth: node.depth + 1,
                        });
                    }
                }
            }
            reached.push(node);
        }

        Ok(reached)
    }
}
