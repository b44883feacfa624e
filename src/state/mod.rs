pub mod game;
pub mod round;
mod sse;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::move_log::MoveLog,
    engine::SharedEngineFactory,
    services::{
        frame_export::FrameExporter,
        persistence::PersistenceGate,
        session_controller::{SessionController, SessionSettings},
    },
    state::game::ParticipantId,
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const PUBLIC_SSE_CAPACITY: usize = 64;

#[derive(Clone)]
/// Handle used to push messages to a connected control pad.
pub struct PadConnection {
    pub participant: ParticipantId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: configuration, the session controller and connection registries.
pub struct AppState {
    config: Arc<AppConfig>,
    controller: SessionController,
    persistence: PersistenceGate,
    frames: FrameExporter,
    public_sse: SseHub,
    pads: DashMap<Uuid, PadConnection>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until an analytics store is installed.
    pub fn new(config: AppConfig, factory: SharedEngineFactory) -> SharedState {
        let public_sse = SseHub::new(PUBLIC_SSE_CAPACITY);
        let persistence = PersistenceGate::new(config.save_path());
        let frames = FrameExporter::new(config.frame_path());
        let controller = SessionController::new(
            SessionSettings::from(&config),
            factory,
            persistence.clone(),
            frames.clone(),
            public_sse.clone(),
        );

        Arc::new(Self {
            config: Arc::new(config),
            controller,
            persistence,
            frames,
            public_sse,
            pads: DashMap::new(),
            shutdown: watch::Sender::new(false),
        })
    }

    /// Shared runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Session lifecycle owner.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Latest exported frame.
    pub fn frames(&self) -> &FrameExporter {
        &self.frames
    }

    /// Obtain a handle to the current analytics store, if one is installed.
    pub async fn move_log(&self) -> Option<Arc<dyn MoveLog>> {
        self.persistence.move_log().await
    }

    /// Install a new analytics store and leave degraded mode.
    pub async fn set_move_log(&self, store: Arc<dyn MoveLog>) {
        self.persistence.set_move_log(store).await;
    }

    /// Forget the analytics store and enter degraded mode.
    pub async fn clear_move_log(&self) {
        self.persistence.clear_move_log().await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.persistence.is_degraded()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.persistence.degraded_watcher()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.persistence.update_degraded(value);
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Registry of open control-pad sockets keyed by connection id.
    pub fn pads(&self) -> &DashMap<Uuid, PadConnection> {
        &self.pads
    }

    /// Flips to `true` once the server starts shutting down.
    pub fn shutdown_watcher(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Stop the session (saving it) and release every long-lived stream so the
    /// HTTP server can drain. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
        if !self.shutdown.send_replace(true) {
            info!(pads = self.pads.len(), "closing streaming connections");
        }
    }

    /// Whether `participant` may run administrative actions.
    pub fn is_operator(&self, participant: ParticipantId) -> bool {
        self.config.operator_id() == Some(participant)
    }
}
