use axum::{Router, http::HeaderMap};

use crate::{error::AppError, state::SharedState, state::game::ParticipantId};

pub mod admin;
pub mod docs;
pub mod health;
pub mod session;
pub mod sse;
pub mod websocket;

/// Header carrying the caller's participant id.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(session::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Read the participant id from the `X-Participant-Id` header.
pub(crate) fn participant_from_headers(headers: &HeaderMap) -> Result<ParticipantId, AppError> {
    let raw = headers
        .get(PARTICIPANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::BadRequest("missing participant header `X-Participant-Id`".into())
        })?;
    raw.parse()
        .map_err(|err: crate::state::game::InvalidParticipant| AppError::BadRequest(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{OPERATOR, ScriptedFactory, test_state};

    async fn body_to_json(body: Body) -> Value {
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, participant: Option<u64>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(id) = participant {
            builder = builder.header(PARTICIPANT_HEADER, id.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, participant: Option<u64>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = participant {
            builder = builder.header(PARTICIPANT_HEADER, id.to_string());
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn healthcheck_reports_degraded_without_store() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app.oneshot(get("/healthcheck", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["status"], "degraded");
    }

    #[tokio::test]
    async fn session_starts_not_loaded() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app.oneshot(get("/session", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["phase"], "not_loaded");
        assert_eq!(json["mode"], "democracy");
    }

    #[tokio::test]
    async fn admin_routes_require_the_operator() {
        let app = router(test_state(ScriptedFactory::new()));

        let response = app
            .clone()
            .oneshot(get("/admin/roms", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(get("/admin/roms", Some(7)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(get("/admin/roms", Some(OPERATOR))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["roms"][0], "test.gb");
    }

    #[tokio::test]
    async fn load_rejects_path_traversal() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app
            .oneshot(post_json(
                "/admin/load",
                Some(OPERATOR),
                r#"{"rom":"../saves/save.state"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn press_without_participant_is_rejected() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app
            .oneshot(post_json("/press", None, r#"{"action":"a"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn press_before_load_conflicts() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app
            .oneshot(post_json("/press", Some(5), r#"{"action":"a"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn frame_is_not_found_before_load() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app.oneshot(get("/frame", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn load_press_and_vote_twice() {
        let app = router(test_state(ScriptedFactory::new()));

        let response = app
            .clone()
            .oneshot(post_json("/admin/load", Some(OPERATOR), r#"{"rom":"test.gb"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(post_json("/press", Some(5), r#"{"action":"up"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["message"], "(DEMOCRACY) Submitted move input for up.");
        assert_eq!(json["participant_id"], "5");

        let response = app
            .clone()
            .oneshot(post_json("/press", Some(5), r#"{"action":"down"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json("/press", Some(6), r#"{"action":"turbo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let response = app.oneshot(get("/frame", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "image/x-portable-pixmap"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_while_running_conflicts_before_name_checks() {
        let app = router(test_state(ScriptedFactory::new()));
        let response = app
            .clone()
            .oneshot(post_json("/admin/load", Some(OPERATOR), r#"{"rom":"test.gb"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for body in [
            r#"{"rom":"missing.gb"}"#,
            r#"{"rom":"../saves/save.state"}"#,
        ] {
            let response = app
                .clone()
                .oneshot(post_json("/admin/load", Some(OPERATOR), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CONFLICT, "{body}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_saves_session_and_drains_open_streams() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let state = test_state(ScriptedFactory::new());
        let rom = state.config().rom_dir().join("test.gb");
        state.controller().load("test.gb", &rom).await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (trigger, fired) = tokio::sync::oneshot::channel::<()>();
        let server_state = state.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router(server_state.clone()))
                .with_graceful_shutdown(async move {
                    let _ = fired.await;
                    server_state.shutdown().await;
                })
                .await
        });

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /sse/public HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut head = vec![0u8; 1024];
        let read = tokio::time::timeout(Duration::from_secs(5), client.read(&mut head))
            .await
            .expect("response head")
            .unwrap();
        assert!(String::from_utf8_lossy(&head[..read]).starts_with("HTTP/1.1 200"));

        trigger.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server drains with a public stream open")
            .unwrap()
            .unwrap();

        assert_eq!(
            state.controller().status().await.phase,
            crate::state::state_machine::SessionPhase::Stopped
        );
        assert!(state.config().save_path().exists());
    }
}
