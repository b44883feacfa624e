use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SessionPhase;

/// Session phase as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    NotLoaded,
    Loading,
    Running,
    Stopped,
}

impl From<SessionPhase> for VisiblePhase {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::NotLoaded => VisiblePhase::NotLoaded,
            SessionPhase::Loading => VisiblePhase::Loading,
            SessionPhase::Running => VisiblePhase::Running,
            SessionPhase::Stopped => VisiblePhase::Stopped,
        }
    }
}
