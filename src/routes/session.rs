use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    dto::{
        admin::ActionResponse,
        play::PlayResponse,
        session::{PressRequest, PressResponse, SessionStatusResponse},
    },
    error::AppError,
    routes::participant_from_headers,
    services::{play_service, sse_events::FRAME_URL},
    state::SharedState,
};

/// Participant-facing routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", get(session_status))
        .route("/play", get(play))
        .route(FRAME_URL, get(frame))
        .route("/press", post(press))
        .route("/save", post(save))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses((status = 200, description = "Current session state", body = SessionStatusResponse))
)]
/// Return the phase, mode and current round of the session.
pub async fn session_status(State(state): State<SharedState>) -> Json<SessionStatusResponse> {
    Json(play_service::session_status(&state).await)
}

#[utoipa::path(
    get,
    path = "/play",
    tag = "session",
    responses((status = 200, description = "Session state and control pad layout", body = PlayResponse))
)]
/// Return what the participant page needs to render.
pub async fn play(State(state): State<SharedState>) -> Json<PlayResponse> {
    Json(play_service::play(&state).await)
}

#[utoipa::path(
    get,
    path = "/frame",
    tag = "session",
    responses(
        (status = 200, description = "Latest frame", content_type = "image/x-portable-pixmap", body = Vec<u8>),
        (status = 404, description = "Nothing rendered yet")
    )
)]
/// Serve the latest exported frame.
pub async fn frame(State(state): State<SharedState>) -> Result<Response, AppError> {
    let frame = play_service::frame(&state).await?;
    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(frame.content_type)),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
    ];
    Ok((headers, frame.bytes.clone()).into_response())
}

#[utoipa::path(
    post,
    path = "/press",
    tag = "session",
    params(("X-Participant-Id" = String, Header, description = "Identifier of the participant pressing")),
    request_body = PressRequest,
    responses(
        (status = 200, description = "Press accepted", body = PressResponse),
        (status = 400, description = "Unknown button or missing participant"),
        (status = 409, description = "Already voted this round or no session running")
    )
)]
/// Submit one button press.
pub async fn press(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<PressRequest>,
) -> Result<Json<PressResponse>, AppError> {
    let participant = participant_from_headers(&headers)?;
    Ok(Json(play_service::press(&state, participant, payload).await?))
}

#[utoipa::path(
    post,
    path = "/save",
    tag = "session",
    responses(
        (status = 200, description = "State saved", body = ActionResponse),
        (status = 409, description = "No session running")
    )
)]
/// Snapshot the running engine into the save file.
pub async fn save(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(play_service::save(&state).await?))
}
