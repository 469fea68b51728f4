//! Graph records stored by the core.
//!
//! # Responsibility
//! - Define the entity and relation records shared by the store and sync.
//! - Keep well-known fields typed and push everything else into one open map.
//!
//! # Invariants
//! - Entity ids are assigned once and never change.
//! - A relation never outlives either of its endpoints.

pub mod entity;
pub mod relation;

/// Open key/value map carried by entities (`metadata`) and relations
/// (`properties`).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
