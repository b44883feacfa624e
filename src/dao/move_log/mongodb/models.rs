use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::MoveEntity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMoveDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub participant_id: i64,
    pub action: String,
    /// Unix seconds, kept numeric for analytics queries.
    pub created_at: i64,
    /// Same instant as a BSON date so TTL or time-series tooling can use it.
    pub recorded_at: DateTime,
}

impl TryFrom<MoveEntity> for MongoMoveDocument {
    type Error = MongoDaoError;

    fn try_from(value: MoveEntity) -> Result<Self, Self::Error> {
        let participant_id = i64::try_from(value.participant_id).map_err(|_| {
            MongoDaoError::ParticipantOutOfRange {
                participant_id: value.participant_id,
            }
        })?;

        Ok(Self {
            id: value.id,
            participant_id,
            action: value.action,
            created_at: value.created_at,
            recorded_at: DateTime::from_millis(value.created_at.saturating_mul(1_000)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Action, ParticipantId};

    #[test]
    fn converts_entities_into_documents() {
        let entity = MoveEntity::new(ParticipantId(418_986_435_144_581_130), Action::Up, 1_700_000_000);
        let document = MongoMoveDocument::try_from(entity.clone()).unwrap();
        assert_eq!(document.id, entity.id);
        assert_eq!(document.participant_id, 418_986_435_144_581_130);
        assert_eq!(document.recorded_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn rejects_ids_beyond_i64() {
        let entity = MoveEntity::new(ParticipantId(u64::MAX), Action::Up, 0);
        assert!(matches!(
            MongoMoveDocument::try_from(entity),
            Err(MongoDaoError::ParticipantOutOfRange { .. })
        ));
    }
}
