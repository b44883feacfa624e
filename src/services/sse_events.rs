use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::tally_summary,
        sse::{
            FrameEvent, ModeChangedEvent, PhaseChangedEvent, RoundResultEvent, ServerEvent,
            SessionFaultEvent, SystemStatus,
        },
    },
    state::{
        SseHub,
        game::{Action, SelectionPolicy},
        round::Round,
        state_machine::SessionPhase,
    },
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
pub(crate) const EVENT_ROUND_RESULT: &str = "round_result";
const EVENT_FRAME: &str = "frame";
pub(crate) const EVENT_MODE_CHANGED: &str = "mode_changed";
const EVENT_SESSION_FAULT: &str = "session_fault";
const EVENT_SYSTEM_STATUS: &str = "system_status";

/// Path the latest frame is served from.
pub const FRAME_URL: &str = "/frame";

/// Human readable outcome of a closed round.
pub fn round_outcome_message(winner: Option<Action>) -> String {
    match winner {
        Some(action) => format!("{action} wins this round!"),
        None => "No buttons were pressed this round!".to_owned(),
    }
}

/// Broadcast a session phase change.
pub fn broadcast_phase_changed(hub: &SseHub, phase: SessionPhase, rom: Option<&str>) {
    let payload = PhaseChangedEvent {
        phase: phase.into(),
        rom: rom.map(str::to_owned),
    };
    send_public_event(hub, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast the result of a round that just closed.
pub fn broadcast_round_result(hub: &SseHub, closed: &Round, policy: SelectionPolicy) {
    let winner = closed.tally.winner();
    let payload = RoundResultEvent {
        round: closed.number,
        policy,
        winner,
        message: round_outcome_message(winner),
        tally: tally_summary(&closed.tally),
    };
    send_public_event(hub, EVENT_ROUND_RESULT, &payload);
}

/// Announce a freshly exported frame.
pub fn broadcast_frame(hub: &SseHub, sequence: u64) {
    let payload = FrameEvent {
        sequence,
        url: FRAME_URL.to_owned(),
    };
    send_public_event(hub, EVENT_FRAME, &payload);
}

/// Announce a policy switch.
pub fn broadcast_mode_changed(hub: &SseHub, mode: SelectionPolicy) {
    let payload = ModeChangedEvent {
        mode,
        message: mode_changed_message(mode),
    };
    send_public_event(hub, EVENT_MODE_CHANGED, &payload);
}

/// Announce that the engine failed and the session stopped.
pub fn broadcast_session_fault(hub: &SseHub, message: &str) {
    let payload = SessionFaultEvent {
        message: message.to_owned(),
    };
    send_public_event(hub, EVENT_SESSION_FAULT, &payload);
}

/// Announce entering or leaving degraded mode.
pub fn broadcast_system_status(hub: &SseHub, degraded: bool) {
    send_public_event(hub, EVENT_SYSTEM_STATUS, &SystemStatus { degraded });
}

/// Confirmation shown to the operator and subscribers after a policy switch.
pub fn mode_changed_message(mode: SelectionPolicy) -> String {
    match mode {
        SelectionPolicy::Democracy => "Mode set to Democracy".to_owned(),
        SelectionPolicy::Anarchy => "Mode set to Anarchy".to_owned(),
    }
}

fn send_public_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::ParticipantId;

    #[test]
    fn outcome_messages() {
        assert_eq!(round_outcome_message(Some(Action::Up)), "up wins this round!");
        assert_eq!(
            round_outcome_message(None),
            "No buttons were pressed this round!"
        );
    }

    #[tokio::test]
    async fn round_results_carry_the_full_tally() {
        let hub = SseHub::new(4);
        let mut rx = hub.subscribe();

        let mut round = Round::new(3, 15);
        round.vote(ParticipantId(1), Action::Up);
        round.vote(ParticipantId(2), Action::Up);
        round.vote(ParticipantId(3), Action::Down);
        broadcast_round_result(&hub, &round, SelectionPolicy::Democracy);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("round_result"));
        let body: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(body["round"], 3);
        assert_eq!(body["winner"], "up");
        assert_eq!(body["tally"]["up"], 2);
        assert_eq!(body["tally"]["down"], 1);
        assert_eq!(body["tally"]["a"], 0);
        assert_eq!(body["tally"].as_object().unwrap().len(), Action::COUNT);
    }
}
