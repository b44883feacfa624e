use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::phase::VisiblePhase,
    state::game::{Action, SelectionPolicy},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from pre-rendered data.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the session changes phase.
pub struct PhaseChangedEvent {
    pub phase: VisiblePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rom: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once at the end of every round.
pub struct RoundResultEvent {
    pub round: u64,
    pub policy: SelectionPolicy,
    /// Applied button, absent when nobody voted.
    pub winner: Option<Action>,
    pub message: String,
    #[schema(value_type = Object)]
    pub tally: IndexMap<Action, u32>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after each exported frame; fetch the image from `url`.
pub struct FrameEvent {
    pub sequence: u64,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the operator switches policy.
pub struct ModeChangedEvent {
    pub mode: SelectionPolicy,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the engine fails and the session stops.
pub struct SessionFaultEvent {
    pub message: String,
}
