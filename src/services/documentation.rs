use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Crowdplay Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::session::session_status,
        crate::routes::session::play,
        crate::routes::session::frame,
        crate::routes::session::press,
        crate::routes::session::save,
        crate::routes::admin::list_roms,
        crate::routes::admin::load_rom,
        crate::routes::admin::set_mode,
        crate::routes::admin::stop_session,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::ws::PadInboundMessage,
            crate::dto::session::SessionStatusResponse,
            crate::dto::session::PressRequest,
            crate::dto::session::PressResponse,
            crate::dto::play::PlayResponse,
            crate::dto::play::PadButton,
            crate::dto::admin::RomListResponse,
            crate::dto::admin::LoadRomRequest,
            crate::dto::admin::LoadRomResponse,
            crate::dto::admin::SetModeRequest,
            crate::dto::admin::ModeResponse,
            crate::dto::admin::StopResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::RoundResultEvent,
            crate::dto::sse::FrameEvent,
            crate::dto::sse::ModeChangedEvent,
            crate::dto::sse::SessionFaultEvent,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Participant view of the shared session"),
        (name = "admin", description = "Operator commands"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "pads", description = "WebSocket operations for control pads"),
    )
)]
pub struct ApiDoc;
