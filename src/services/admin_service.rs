//! Business logic powering the operator REST routes. ROM names are resolved
//! inside the configured ROM directory before anything reaches the controller.

use std::path::PathBuf;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dto::admin::{
        LoadRomRequest, LoadRomResponse, ModeResponse, RomListResponse, SetModeRequest,
        StopResponse,
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, game::SelectionPolicy},
};

/// List the ROM files available in the ROM directory, sorted by name.
pub async fn list_roms(state: &SharedState) -> Result<RomListResponse, ServiceError> {
    let config = state.config();
    let mut entries = match tokio::fs::read_dir(config.rom_dir()).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %config.rom_dir().display(), "ROM directory does not exist");
            return Ok(RomListResponse {
                roms: Vec::new(),
                message: Some("No ROMs found.".into()),
            });
        }
        Err(err) => {
            return Err(ServiceError::InvalidInput(format!(
                "cannot read ROM directory: {err}"
            )));
        }
    };

    let mut roms = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| ServiceError::InvalidInput(format!("cannot read ROM directory: {err}")))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            roms.push(name);
        }
    }
    roms.sort();

    let message = roms.is_empty().then(|| "No ROMs found.".to_string());
    Ok(RomListResponse { roms, message })
}

/// Resolve a validated ROM name to a file inside the ROM directory.
async fn resolve_rom(state: &SharedState, rom: &str) -> Result<PathBuf, ServiceError> {
    let path = state.config().rom_dir().join(rom);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(ServiceError::NotFound(format!("ROM `{rom}` not found"))),
    }
}

/// Load the requested ROM and start the round loop.
/// A busy session is reported before the ROM name is checked.
pub async fn load_rom(
    state: &SharedState,
    request: LoadRomRequest,
) -> Result<LoadRomResponse, ServiceError> {
    state.controller().ensure_idle().await?;
    request.validate()?;
    let path = resolve_rom(state, &request.rom).await?;
    let outcome = state.controller().load(&request.rom, &path).await?;
    info!(rom = %outcome.rom, restored = outcome.restored, "ROM loaded by operator");
    Ok(outcome.into())
}

/// Switch between democracy and anarchy.
pub async fn set_mode(
    state: &SharedState,
    request: SetModeRequest,
) -> Result<ModeResponse, ServiceError> {
    let mode: SelectionPolicy = request.mode.parse()?;
    let mode = state.controller().set_mode(mode).await;
    Ok(ModeResponse {
        mode,
        message: sse_events::mode_changed_message(mode),
    })
}

/// Stop the running session, saving the engine state.
pub async fn stop(state: &SharedState) -> Result<StopResponse, ServiceError> {
    let outcome = state.controller().stop().await?;
    Ok(outcome.into())
}
