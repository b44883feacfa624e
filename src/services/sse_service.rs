use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{FutureExt, Stream};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::ServerEvent,
    state::{SharedState, SseHub},
};

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.public_sse().subscribe()
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects or `shutdown` turns `true`.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = shutdown.wait_for(|stopping| *stopping).map(drop) => {
                    tracing::debug!("server shutting down; ending public SSE stream");
                    break;
                }
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Frames arrive every tick; slow clients just miss some.
                            tracing::debug!(skipped, "public SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        tracing::info!("Public SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Send a human-readable info message onto the public SSE stream.
pub fn broadcast_public_info(hub: &SseHub, message: &str) {
    hub.broadcast(ServerEvent::new(
        Some("info".to_string()),
        message.to_string(),
    ));
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn stream_ends_when_shutdown_starts() {
        let hub = SseHub::new(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let response = to_sse_stream(hub.subscribe(), shutdown_rx).into_response();
        let mut body = response.into_body().into_data_stream();

        broadcast_public_info(&hub, "hello");
        let first = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("first event")
            .expect("open stream")
            .unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains("event: info"));
        assert!(text.contains("data: hello"));

        shutdown_tx.send_replace(true);
        let end = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("stream ends after shutdown");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn late_subscribers_end_immediately_during_shutdown() {
        let hub = SseHub::new(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(true);
        let mut body = to_sse_stream(hub.subscribe(), shutdown_rx)
            .into_response()
            .into_body()
            .into_data_stream();

        let end = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("stream ends right away");
        assert!(end.is_none());
    }
}
