//! DTO definitions used by the operator REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::validate_rom_name,
    services::session_controller::{LoadOutcome, StopOutcome},
    state::game::SelectionPolicy,
};

/// ROM files available for loading.
#[derive(Debug, Serialize, ToSchema)]
pub struct RomListResponse {
    pub roms: Vec<String>,
    /// Hint shown when the list is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request to load a ROM from the ROM directory.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoadRomRequest {
    /// File name as returned by `/admin/roms`.
    pub rom: String,
}

impl Validate for LoadRomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_rom_name(&self.rom) {
            errors.add("rom", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Returned once the ROM runs.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoadRomResponse {
    pub rom: String,
    /// Whether the previous save was restored.
    pub restored: bool,
    pub message: String,
}

impl From<LoadOutcome> for LoadRomResponse {
    fn from(outcome: LoadOutcome) -> Self {
        let message = if outcome.restored {
            format!("Loaded {} from the existing save", outcome.rom)
        } else {
            format!("Loaded {}, starting new run", outcome.rom)
        };
        Self {
            rom: outcome.rom,
            restored: outcome.restored,
            message,
        }
    }
}

/// Request to switch the selection policy.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetModeRequest {
    /// `democracy` or `anarchy`, case-insensitive.
    pub mode: String,
}

/// Policy now in effect.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModeResponse {
    pub mode: SelectionPolicy,
    pub message: String,
}

/// Summary of a stopped session.
#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    pub rom: Option<String>,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
}

impl From<StopOutcome> for StopResponse {
    fn from(outcome: StopOutcome) -> Self {
        Self {
            rom: outcome.rom,
            saved: outcome.saved,
            save_error: outcome.save_error,
        }
    }
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
