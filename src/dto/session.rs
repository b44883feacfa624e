use indexmap::IndexMap;
use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;

use crate::{
    dto::phase::VisiblePhase,
    services::{input_gateway::SubmitOutcome, session_controller::SessionStatus},
    state::{
        game::{Action, ParticipantId, SelectionPolicy},
        round::RoundTally,
    },
};

/// Every button with its vote count, in tie-break order.
pub fn tally_summary(tally: &RoundTally) -> IndexMap<Action, u32> {
    tally.entries().collect()
}

/// Current state of the shared session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    /// Lifecycle phase as shown to clients.
    pub phase: VisiblePhase,
    /// Active selection mode.
    pub mode: SelectionPolicy,
    /// ROM currently loaded, if any.
    pub rom: Option<String>,
    /// Number of the open round.
    pub round: u64,
    /// Whole seconds until the open round closes.
    pub remaining_secs: u64,
    /// Votes per button in tie-break order; zero counts included.
    #[schema(value_type = Object)]
    pub tally: IndexMap<Action, u32>,
    /// Distinct participants who voted this round.
    pub voters: usize,
    /// Set when the engine failed during the last session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fault: Option<String>,
    /// Whether the analytics store is unavailable.
    pub degraded: bool,
    /// Control pads currently connected over WebSocket.
    pub connected_pads: usize,
}

impl SessionStatusResponse {
    /// Combine the controller view with server-level health.
    pub fn new(status: SessionStatus, degraded: bool, connected_pads: usize) -> Self {
        Self {
            phase: status.phase.into(),
            mode: status.policy,
            rom: status.rom,
            round: status.round,
            remaining_secs: status.remaining_secs,
            tally: tally_summary(&status.tally),
            voters: status.voters,
            last_fault: status.last_fault,
            degraded,
            connected_pads,
        }
    }
}

/// Button press submitted over HTTP; the participant comes from `X-Participant-Id`.
#[derive(Debug, serde::Deserialize, ToSchema)]
pub struct PressRequest {
    /// Lowercase button name.
    pub action: String,
}

/// Reply to an accepted press.
#[serde_as]
#[derive(Debug, Serialize, ToSchema)]
pub struct PressResponse {
    #[serde_as(as = "DisplayFromStr")]
    #[schema(value_type = String)]
    pub participant_id: ParticipantId,
    pub mode: SelectionPolicy,
    pub action: Action,
    pub round: u64,
    pub message: String,
    /// Democracy only: the tally after this vote.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub tally: Option<IndexMap<Action, u32>>,
    /// Democracy only: seconds until the round closes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
}

impl PressResponse {
    pub fn new(participant: ParticipantId, outcome: &SubmitOutcome) -> Self {
        let (round, tally, remaining_secs) = match outcome {
            SubmitOutcome::Counted {
                round,
                tally,
                remaining_secs,
                ..
            } => (*round, Some(tally_summary(tally)), Some(*remaining_secs)),
            SubmitOutcome::Applied { round, .. } => (*round, None, None),
        };

        Self {
            participant_id: participant,
            mode: outcome.policy(),
            action: outcome.action(),
            round,
            message: outcome.message(),
            tally,
            remaining_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_response_keeps_ids_exact() {
        let mut tally = RoundTally::new();
        tally.record(Action::Up);
        let outcome = SubmitOutcome::Counted {
            round: 4,
            action: Action::Up,
            tally,
            remaining_secs: 11,
        };

        let body = serde_json::to_value(PressResponse::new(
            ParticipantId(418_986_435_144_581_130),
            &outcome,
        ))
        .unwrap();
        assert_eq!(body["participant_id"], "418986435144581130");
        assert_eq!(body["mode"], "democracy");
        assert_eq!(body["tally"]["up"], 1);
        assert_eq!(body["remaining_secs"], 11);
    }

    #[test]
    fn anarchy_responses_omit_the_tally() {
        let outcome = SubmitOutcome::Applied {
            round: 1,
            action: Action::B,
        };
        let body = serde_json::to_value(PressResponse::new(ParticipantId(1), &outcome)).unwrap();
        assert_eq!(body["message"], "(ANARCHY) Submitted move input for b.");
        assert!(body.get("tally").is_none());
    }
}
