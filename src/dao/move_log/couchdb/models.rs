use serde::Serialize;

use crate::dao::models::MoveEntity;

pub const MOVE_PREFIX: &str = "move::";

/// Moves are keyed by time first so `_all_docs` range scans come back in order.
pub fn move_doc_id(entry: &MoveEntity) -> String {
    format!("{MOVE_PREFIX}{:012}::{}", entry.created_at.max(0), entry.id)
}

#[derive(Debug, Clone, Serialize)]
pub struct CouchMoveDocument {
    #[serde(rename = "_id")]
    pub id: String,
    /// Stored as text: CouchDB numbers are doubles and would round 64-bit ids.
    pub participant_id: String,
    pub action: String,
    pub created_at: i64,
}

impl From<MoveEntity> for CouchMoveDocument {
    fn from(value: MoveEntity) -> Self {
        Self {
            id: move_doc_id(&value),
            participant_id: value.participant_id.to_string(),
            action: value.action,
            created_at: value.created_at,
        }
    }
}
