use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        session::PressResponse,
        ws::{PadInboundMessage, PadOutboundMessage},
    },
    services::{input_gateway, sse_events},
    state::{PadConnection, SharedState},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures while serving one control-pad connection.
#[derive(Debug, Error)]
enum PadError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Handle the full lifecycle for an individual control-pad WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let participant = match PadInboundMessage::from_json_str(&initial_message) {
        Ok(PadInboundMessage::Identification { participant_id }) => participant_id,
        Ok(_) => {
            warn!("first message was not identification");
            let _ = send_message(
                &outbound_tx,
                &PadOutboundMessage::Error {
                    message: "identify before pressing buttons".into(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse pad identification");
            let _ = send_message(
                &outbound_tx,
                &PadOutboundMessage::Error {
                    message: format!("invalid identification: {err}"),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    state.pads().insert(
        connection_id,
        PadConnection {
            participant,
            tx: outbound_tx.clone(),
        },
    );
    info!(participant = %participant, connection = %connection_id, "control pad connected");

    if send_message(
        &outbound_tx,
        &PadOutboundMessage::Identified {
            participant_id: participant,
        },
    )
    .is_err()
    {
        state.pads().remove(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let relay_task = spawn_round_relay(&state, outbound_tx.clone());
    let mut shutdown = state.shutdown_watcher();

    loop {
        let message = tokio::select! {
            _ = shutdown.wait_for(|stopping| *stopping) => {
                info!(participant = %participant, "server shutting down, closing control pad");
                let _ = outbound_tx.send(Message::Close(None));
                break;
            }
            next = receiver.next() => match next {
                Some(message) => message,
                None => break,
            },
        };
        match message {
            Ok(Message::Text(text)) => match PadInboundMessage::from_json_str(&text) {
                Ok(PadInboundMessage::Press { action }) => {
                    let reply = match input_gateway::submit(state.controller(), participant, &action)
                        .await
                    {
                        Ok(outcome) => {
                            PadOutboundMessage::PressResult(PressResponse::new(participant, &outcome))
                        }
                        Err(err) => {
                            warn!(participant = %participant, error = %err, "pad press rejected");
                            PadOutboundMessage::Error {
                                message: err.to_string(),
                            }
                        }
                    };
                    if send_message(&outbound_tx, &reply).is_err() {
                        info!(participant = %participant, "connection closed during press handling, terminating");
                        break;
                    }
                }
                Ok(PadInboundMessage::Identification { .. }) => {
                    warn!(participant = %participant, "ignoring duplicate identification message");
                }
                Ok(PadInboundMessage::Unknown) => {
                    warn!(participant = %participant, payload = %text.as_str(), "ignoring unknown pad message");
                }
                Err(err) => {
                    warn!(participant = %participant, error = %err, "failed to parse pad message");
                    let _ = send_message(
                        &outbound_tx,
                        &PadOutboundMessage::Error {
                            message: format!("invalid message: {err}"),
                        },
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(participant = %participant, "control pad closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(participant = %participant, error = %err, "websocket error");
                break;
            }
        }
    }

    relay_task.abort();
    state.pads().remove(&connection_id);
    info!(participant = %participant, connection = %connection_id, "control pad disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Forward round results and mode switches from the public stream to one pad.
fn spawn_round_relay(state: &SharedState, tx: mpsc::UnboundedSender<Message>) -> JoinHandle<()> {
    let mut events = state.public_sse().subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            let Some(name) = event.event.as_deref() else {
                continue;
            };
            if name != sse_events::EVENT_ROUND_RESULT && name != sse_events::EVENT_MODE_CHANGED {
                continue;
            }
            let Ok(data) = serde_json::from_str::<serde_json::Value>(&event.data) else {
                continue;
            };
            let relayed = PadOutboundMessage::Event {
                event: name.to_string(),
                data,
            };
            if send_message(&tx, &relayed).is_err() {
                break;
            }
        }
    })
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), PadError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| PadError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
