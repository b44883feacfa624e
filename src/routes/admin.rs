use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tracing::warn;

use crate::{
    dto::admin::{
        LoadRomRequest, LoadRomResponse, ModeResponse, RomListResponse, SetModeRequest,
        StopResponse,
    },
    error::AppError,
    routes::participant_from_headers,
    services::admin_service,
    state::SharedState,
};

/// Operator-only endpoints driving the shared session.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/roms", get(list_roms))
        .route("/admin/load", post(load_rom))
        .route("/admin/mode", post(set_mode))
        .route("/admin/stop", post(stop_session))
        .route_layer(middleware::from_fn_with_state(state, require_operator))
}

/// List the ROM files that can be loaded.
#[utoipa::path(
    get,
    path = "/admin/roms",
    tag = "admin",
    params(("X-Participant-Id" = String, Header, description = "Identifier of the configured operator")),
    responses(
        (status = 200, description = "Available ROMs", body = RomListResponse),
        (status = 401, description = "Caller is not the operator")
    )
)]
pub async fn list_roms(State(state): State<SharedState>) -> Result<Json<RomListResponse>, AppError> {
    Ok(Json(admin_service::list_roms(&state).await?))
}

/// Load a ROM, restoring its save when one exists, and start the rounds.
#[utoipa::path(
    post,
    path = "/admin/load",
    tag = "admin",
    params(("X-Participant-Id" = String, Header, description = "Identifier of the configured operator")),
    request_body = LoadRomRequest,
    responses(
        (status = 200, description = "ROM running", body = LoadRomResponse),
        (status = 400, description = "Invalid ROM name"),
        (status = 404, description = "ROM not found"),
        (status = 409, description = "A session is already loading or running"),
        (status = 422, description = "The engine rejected the ROM")
    )
)]
pub async fn load_rom(
    State(state): State<SharedState>,
    Json(payload): Json<LoadRomRequest>,
) -> Result<Json<LoadRomResponse>, AppError> {
    Ok(Json(admin_service::load_rom(&state, payload).await?))
}

/// Switch between democracy and anarchy.
#[utoipa::path(
    post,
    path = "/admin/mode",
    tag = "admin",
    params(("X-Participant-Id" = String, Header, description = "Identifier of the configured operator")),
    request_body = SetModeRequest,
    responses(
        (status = 200, description = "Mode changed", body = ModeResponse),
        (status = 400, description = "Unknown mode")
    )
)]
pub async fn set_mode(
    State(state): State<SharedState>,
    Json(payload): Json<SetModeRequest>,
) -> Result<Json<ModeResponse>, AppError> {
    Ok(Json(admin_service::set_mode(&state, payload).await?))
}

/// Stop the running session and save the engine state.
#[utoipa::path(
    post,
    path = "/admin/stop",
    tag = "admin",
    params(("X-Participant-Id" = String, Header, description = "Identifier of the configured operator")),
    responses(
        (status = 200, description = "Session stopped", body = StopResponse),
        (status = 409, description = "No session is running")
    )
)]
pub async fn stop_session(State(state): State<SharedState>) -> Result<Json<StopResponse>, AppError> {
    Ok(Json(admin_service::stop(&state).await?))
}

async fn require_operator(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let participant = participant_from_headers(req.headers())
        .map_err(|_| AppError::Unauthorized("missing or invalid `X-Participant-Id`".into()))?;
    if state.is_operator(participant) {
        Ok(next.run(req).await)
    } else {
        warn!(participant = %participant, "rejected admin request from non-operator");
        Err(AppError::Unauthorized(
            "only the operator may run admin commands".into(),
        ))
    }
}
