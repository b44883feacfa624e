use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::state::game::{Action, ParticipantId};

/// One button press as recorded in the analytics log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct MoveEntity {
    /// Unique identifier of the log entry.
    pub id: Uuid,
    /// Chat-platform id of the participant who pressed.
    #[validate(range(min = 1))]
    pub participant_id: u64,
    /// Lowercase button name (`up`, `a`, ...).
    #[validate(length(min = 1, max = 10))]
    pub action: String,
    /// Unix timestamp (seconds) of the press.
    pub created_at: i64,
}

impl MoveEntity {
    /// Build a new log entry for `participant` pressing `action` at `created_at`.
    pub fn new(participant: ParticipantId, action: Action, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id: participant.get(),
            action: action.as_str().to_owned(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_entries_pass_validation() {
        let entry = MoveEntity::new(ParticipantId(418), Action::Select, 1_700_000_000);
        assert!(entry.validate().is_ok());
        assert_eq!(entry.action, "select");
    }

    #[test]
    fn zero_participant_is_rejected() {
        let entry = MoveEntity::new(ParticipantId(0), Action::A, 1_700_000_000);
        let errors = entry.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("participant_id"));
    }
}
