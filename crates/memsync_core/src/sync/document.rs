//! Document-to-record mapping.
//!
//! # Responsibility
//! - Detect unresolved merge conflicts before anything else is parsed.
//! - Split an optional `---` front matter block from the body.
//! - Build the normalized payload the store upserts.
//!
//! # Invariants
//! - Conflicted content never yields a [`NormalizedDocument`].
//! - Malformed front matter degrades to empty metadata plus a warning.
//! - Pass-through metadata is applied after the reserved keys.

use crate::model::entity::{
    merge_metadata, EntityId, EntityPatch, NewEntity, DEFAULT_ENTITY_TYPE,
};
use crate::model::Metadata;
use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::Path;

pub const FRONT_MATTER_DELIMITER: &str = "---";
pub const SOURCE_TAG: &str = "file_based";

static CONFLICT_MARKERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^<{7}[^\n]*\n.*?^={7}[ \t]*\r?$.*?^>{7}").expect("valid conflict regex")
});

/// Payload derived from one source document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    /// File stem.
    pub name: String,
    /// Front matter `type`, or `document`.
    pub entity_type: String,
    /// Trimmed body, one element per observation.
    pub observations: Vec<String>,
    pub metadata: Metadata,
}

impl NormalizedDocument {
    pub fn content(&self) -> String {
        self.observations.join("\n")
    }

    /// Creation payload; `id` pins the entity id when re-binding a ledger entry.
    pub fn to_new_entity(&self, id: Option<EntityId>) -> NewEntity {
        NewEntity {
            id,
            kind: Some(self.entity_type.clone()),
            name: Some(self.name.clone()),
            content: Some(self.content()),
            metadata: self.metadata.clone(),
        }
    }

    pub fn to_patch(&self) -> EntityPatch {
        EntityPatch::from(self.to_new_entity(None))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Document(NormalizedDocument),
    /// Content holds unresolved merge markers and must be quarantined.
    Conflict,
}

/// True when `content` has `<<<<<<<`, `=======`, `>>>>>>>` line markers in order.
pub fn has_conflict_markers(content: &str) -> bool {
    CONFLICT_MARKERS_RE.is_match(content)
}

/// Parses one document whose ledger key is `relative_path`.
///
/// `parsed_at` becomes `metadata.last_updated`. Header metadata may override
/// it, but never `source` or `file_path`.
pub fn parse_document(relative_path: &str, content: &str, parsed_at: DateTime<Utc>) -> ParseOutcome {
    if has_conflict_markers(content) {
        return ParseOutcome::Conflict;
    }

    let (front_matter, body) = split_front_matter(relative_path, content);

    let entity_type = match front_matter.get("type") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => kind.trim().to_string(),
        Some(Value::Null) | None => DEFAULT_ENTITY_TYPE.to_string(),
        Some(other) => {
            warn!(
                "event=document_parse module=document status=degraded path={} reason=invalid_type value={}",
                relative_path, other
            );
            DEFAULT_ENTITY_TYPE.to_string()
        }
    };

    let mut metadata = Metadata::new();
    metadata.insert(
        "last_updated".to_string(),
        Value::from(parsed_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    match front_matter.get("metadata") {
        Some(Value::Object(extra)) => merge_metadata(&mut metadata, extra),
        Some(Value::Null) | None => {}
        Some(other) => warn!(
            "event=document_parse module=document status=degraded path={} reason=metadata_not_mapping value={}",
            relative_path, other
        ),
    }
    // The store finds a path's entity by these two keys; headers cannot move them.
    for (key, value) in [("source", SOURCE_TAG), ("file_path", relative_path)] {
        let previous = metadata.insert(key.to_string(), Value::from(value));
        if previous.is_some_and(|previous| previous != value) {
            warn!(
                "event=document_parse module=document status=degraded path={} reason=reserved_key key={}",
                relative_path, key
            );
        }
    }

    ParseOutcome::Document(NormalizedDocument {
        name: file_stem(relative_path),
        entity_type,
        observations: vec![body.trim().to_string()],
        metadata,
    })
}

/// Splits `content` into front matter mapping and body.
///
/// Without an opening delimiter line the whole content is body.
pub fn split_front_matter<'a>(relative_path: &str, content: &'a str) -> (Metadata, &'a str) {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(after_open) = strip_delimiter_line(text) else {
        return (Metadata::new(), text);
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            let header = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return (parse_header(relative_path, header), body);
        }
        offset += line.len();
    }

    warn!(
        "event=document_parse module=document status=degraded path={} reason=unterminated_front_matter",
        relative_path
    );
    (Metadata::new(), text)
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let first_line_end = text.find('\n').map_or(text.len(), |index| index + 1);
    let (first_line, rest) = text.split_at(first_line_end);
    (first_line.trim_end() == FRONT_MATTER_DELIMITER).then_some(rest)
}

fn parse_header(relative_path: &str, header: &str) -> Metadata {
    match serde_yaml::from_str::<Value>(header) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Metadata::new(),
        Ok(other) => {
            warn!(
                "event=document_parse module=document status=degraded path={} reason=front_matter_not_mapping value={}",
                relative_path, other
            );
            Metadata::new()
        }
        Err(err) => {
            warn!(
                "event=document_parse module=document status=degraded path={} reason=front_matter_invalid error={}",
                relative_path,
                crate::logging::single_line(&err.to_string(), 200)
            );
            Metadata::new()
        }
    }
}

fn file_stem(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative_path.to_string())
}
