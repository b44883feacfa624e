use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::ToSchema;

use crate::{dto::session::PressResponse, state::game::ParticipantId};

#[serde_as]
#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from control-pad WebSocket clients.
#[serde(tag = "type")]
pub enum PadInboundMessage {
    #[serde(rename = "identification")]
    Identification {
        #[serde_as(as = "DisplayFromStr")]
        #[schema(value_type = String)]
        participant_id: ParticipantId,
    },
    #[serde(rename = "press")]
    Press { action: String },
    #[serde(other)]
    Unknown,
}

impl PadInboundMessage {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
/// Messages pushed to a control pad.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PadOutboundMessage {
    /// Sent once the identification is accepted.
    Identified {
        #[serde_as(as = "DisplayFromStr")]
        participant_id: ParticipantId,
    },
    PressResult(PressResponse),
    /// Public stream event relayed to the pad, e.g. `round_result`.
    Event {
        event: String,
        data: serde_json::Value,
    },
    Error { message: String },
}
