//! Participant-facing operations: session status, presses, saves and frames.

use std::sync::Arc;

use crate::{
    dto::{
        admin::ActionResponse,
        play::{PlayResponse, pad_rows},
        session::{PressRequest, PressResponse, SessionStatusResponse},
    },
    engine::Frame,
    error::ServiceError,
    services::{input_gateway, sse_events::FRAME_URL},
    state::{SharedState, game::ParticipantId},
};

/// Snapshot of the session as shown to participants.
pub async fn session_status(state: &SharedState) -> SessionStatusResponse {
    let status = state.controller().status().await;
    SessionStatusResponse::new(status, state.is_degraded(), state.pads().len())
}

/// Status plus everything needed to draw the control pad.
pub async fn play(state: &SharedState) -> PlayResponse {
    PlayResponse {
        status: session_status(state).await,
        frame_url: FRAME_URL.to_string(),
        pad: pad_rows(),
    }
}

/// Submit one press on behalf of `participant`.
pub async fn press(
    state: &SharedState,
    participant: ParticipantId,
    request: PressRequest,
) -> Result<PressResponse, ServiceError> {
    let outcome = input_gateway::submit(state.controller(), participant, &request.action).await?;
    Ok(PressResponse::new(participant, &outcome))
}

/// Force a save of the running engine.
pub async fn save(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    state.controller().save().await?;
    Ok(ActionResponse {
        message: "Game state saved".into(),
    })
}

/// Latest exported frame, rendering one on demand when none was exported yet.
pub async fn frame(state: &SharedState) -> Result<Arc<Frame>, ServiceError> {
    if let Some(exported) = state.frames().latest() {
        return Ok(exported.frame);
    }
    match state.controller().request_frame().await {
        Ok(frame) => Ok(Arc::new(frame)),
        Err(ServiceError::SessionNotActive) => {
            Err(ServiceError::NotFound("no frame has been rendered yet".into()))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dto::admin::LoadRomRequest,
        services::admin_service,
        test_support::{ScriptedFactory, test_state},
    };

    #[tokio::test]
    async fn frame_is_missing_before_any_load() {
        let state = test_state(ScriptedFactory::new());
        let err = frame(&state).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn press_and_status_agree() {
        let state = test_state(ScriptedFactory::new());
        admin_service::load_rom(
            &state,
            LoadRomRequest {
                rom: "test.gb".into(),
            },
        )
        .await
        .unwrap();

        let reply = press(
            &state,
            ParticipantId(12),
            PressRequest {
                action: "start".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(reply.message, "(DEMOCRACY) Submitted move input for start.");

        let status = session_status(&state).await;
        assert_eq!(status.voters, 1);
        assert_eq!(status.rom.as_deref(), Some("test.gb"));
        assert!(status.degraded);

        assert!(frame(&state).await.is_ok());
        assert!(save(&state).await.is_ok());
    }
}
