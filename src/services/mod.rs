/// Operator commands: ROM listing, loading, mode switches and stops.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Frame file export and latest-frame cache.
pub mod frame_export;
/// Health check service.
pub mod health_service;
/// Validation and routing of participant presses.
pub mod input_gateway;
/// Save file and analytics store access.
pub mod persistence;
/// Participant-facing queries and presses.
pub mod play_service;
/// Task owning the engine while rounds run.
pub mod round_loop;
/// Session lifecycle owner.
pub mod session_controller;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Analytics store connection supervisor.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
