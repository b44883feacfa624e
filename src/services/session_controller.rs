//! Session lifecycle: loading a ROM, running rounds and stopping.
//!
//! Round-mutable state lives in one [`SessionCore`] behind a single async
//! mutex. The engine itself never sits behind that lock: once built it is
//! moved into the [`RoundLoop`] task, and every later engine access goes
//! through [`LoopCommand`]s.

use std::{path::Path, sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, MutexGuard, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    dao::save_state::PersistenceError,
    engine::{Engine, EngineError, Frame, SharedEngineFactory},
    error::ServiceError,
    services::{
        frame_export::FrameExporter,
        persistence::PersistenceGate,
        round_loop::{LoopCommand, LoopExit, RoundLoop},
        sse_events,
    },
    state::{
        SseHub,
        game::SelectionPolicy,
        round::{Round, RoundTally},
        state_machine::{SessionEvent, SessionPhase, SessionStateMachine, StopReason},
    },
};

/// Commands waiting for the loop beyond this many make callers wait.
const COMMAND_QUEUE: usize = 64;

/// Pacing of the round loop.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Ticks per round.
    pub round_ticks: u32,
    /// Wall-clock length of one tick.
    pub tick_interval: Duration,
    /// Engine frames emulated per tick.
    pub frames_per_tick: u32,
    /// Engine steps a pressed button stays held.
    pub hold_ticks: u32,
    /// Policy in effect before the operator changes it.
    pub initial_policy: SelectionPolicy,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            round_ticks: config.round_ticks(),
            tick_interval: config.tick_interval(),
            frames_per_tick: config.frames_per_tick(),
            hold_ticks: config.hold_ticks(),
            initial_policy: config.initial_policy(),
        }
    }
}

/// Everything mutated by both submitters and the round loop.
pub(crate) struct SessionCore {
    pub(crate) machine: SessionStateMachine,
    pub(crate) policy: SelectionPolicy,
    pub(crate) round: Round,
    pub(crate) rom: Option<String>,
    pub(crate) last_fault: Option<String>,
    pub(crate) run: Option<LoopHandle>,
}

impl SessionCore {
    fn new(settings: &SessionSettings) -> Self {
        Self {
            machine: SessionStateMachine::new(),
            policy: settings.initial_policy,
            round: Round::new(1, settings.round_ticks),
            rom: None,
            last_fault: None,
            run: None,
        }
    }

    pub(crate) fn require_running(&self) -> Result<(), ServiceError> {
        if self.machine.is_running() {
            Ok(())
        } else {
            Err(ServiceError::SessionNotActive)
        }
    }

    /// Seconds left in the current round.
    pub(crate) fn remaining_secs(&self, tick_interval: Duration) -> u64 {
        (tick_interval * self.round.remaining_ticks).as_secs()
    }

    /// Sender feeding the running loop.
    pub(crate) fn command_sender(&self) -> Result<mpsc::Sender<LoopCommand>, ServiceError> {
        self.run
            .as_ref()
            .map(|run| run.commands.clone())
            .ok_or(ServiceError::SessionNotActive)
    }
}

/// Handles onto a spawned round loop.
pub(crate) struct LoopHandle {
    pub(crate) commands: mpsc::Sender<LoopCommand>,
    stop: watch::Sender<bool>,
    task: JoinHandle<LoopExit>,
}

/// State shared between the controller handle and its loop task.
pub(crate) struct ControllerShared {
    pub(crate) core: Mutex<SessionCore>,
    pub(crate) settings: SessionSettings,
    pub(crate) factory: SharedEngineFactory,
    pub(crate) persistence: PersistenceGate,
    pub(crate) frames: FrameExporter,
    pub(crate) events: SseHub,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Name of the loaded ROM.
    pub rom: String,
    /// Whether a saved state was applied.
    pub restored: bool,
}

/// Result of stopping a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    /// ROM that was running.
    pub rom: Option<String>,
    /// Whether the final snapshot reached the save file.
    pub saved: bool,
    /// Why the final snapshot is missing, when it is.
    pub save_error: Option<String>,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Lifecycle phase.
    pub phase: SessionPhase,
    /// How presses become engine input.
    pub policy: SelectionPolicy,
    /// ROM currently loaded, if any.
    pub rom: Option<String>,
    /// Number of the open round.
    pub round: u64,
    /// Whole seconds until the open round closes.
    pub remaining_secs: u64,
    /// Votes cast in the open round.
    pub tally: RoundTally,
    /// Distinct participants who voted this round.
    pub voters: usize,
    /// Engine failure that ended the last session.
    pub last_fault: Option<String>,
}

struct PreparedEngine {
    engine: Box<dyn Engine>,
    restored: bool,
    frame: Frame,
}

/// Owner of the session lifecycle. Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<ControllerShared>,
}

impl SessionController {
    /// Build an idle controller.
    pub fn new(
        settings: SessionSettings,
        factory: SharedEngineFactory,
        persistence: PersistenceGate,
        frames: FrameExporter,
        events: SseHub,
    ) -> Self {
        Self {
            shared: Arc::new(ControllerShared {
                core: Mutex::new(SessionCore::new(&settings)),
                settings,
                factory,
                persistence,
                frames,
                events,
            }),
        }
    }

    /// Loop pacing in effect.
    pub fn settings(&self) -> &SessionSettings {
        &self.shared.settings
    }

    /// Gate used for saves and the move log.
    pub fn persistence(&self) -> &PersistenceGate {
        &self.shared.persistence
    }

    /// Exporter holding the latest frame.
    pub fn frames(&self) -> &FrameExporter {
        &self.shared.frames
    }

    pub(crate) async fn lock_core(&self) -> MutexGuard<'_, SessionCore> {
        self.shared.core.lock().await
    }

    /// Fail with [`ServiceError::SessionBusy`] while a ROM is loading or running.
    pub async fn ensure_idle(&self) -> Result<(), ServiceError> {
        match self.lock_core().await.machine.phase() {
            SessionPhase::Loading | SessionPhase::Running => Err(ServiceError::SessionBusy),
            SessionPhase::NotLoaded | SessionPhase::Stopped => Ok(()),
        }
    }

    /// Construct an engine for `rom_path`, restore the save and start the round loop.
    ///
    /// Fails with [`ServiceError::SessionBusy`] unless nothing is loaded or the
    /// previous session stopped.
    pub async fn load(&self, rom: &str, rom_path: &Path) -> Result<LoadOutcome, ServiceError> {
        {
            let mut core = self.lock_core().await;
            core.machine
                .apply(SessionEvent::Load)
                .map_err(|_| ServiceError::SessionBusy)?;
            core.rom = Some(rom.to_owned());
            core.last_fault = None;
        }
        sse_events::broadcast_phase_changed(&self.shared.events, SessionPhase::Loading, Some(rom));
        info!(rom, "loading ROM");

        self.shared.frames.reset().await;

        let prepared = match self.prepare_engine(rom_path).await {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(rom, error = %err, "failed to start the engine");
                {
                    let mut core = self.lock_core().await;
                    if let Err(invalid) = core.machine.apply(SessionEvent::LoadFailed) {
                        error!(error = %invalid, "session left the loading phase unexpectedly");
                    }
                    core.rom = None;
                }
                sse_events::broadcast_phase_changed(
                    &self.shared.events,
                    SessionPhase::NotLoaded,
                    None,
                );
                return Err(ServiceError::EngineConstruction(err));
            }
        };

        let PreparedEngine {
            engine,
            restored,
            frame,
        } = prepared;
        let exported = self.shared.frames.publish(frame).await;

        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let (stop_tx, stop_rx) = watch::channel(false);
        {
            let mut core = self.lock_core().await;
            core.machine
                .apply(SessionEvent::EngineReady)
                .map_err(|_| ServiceError::SessionBusy)?;
            core.round = Round::new(1, self.shared.settings.round_ticks);

            let round_loop = RoundLoop::new(self.shared.clone(), engine, commands_rx, stop_rx);
            let task = tokio::spawn(round_loop.run());
            core.run = Some(LoopHandle {
                commands: commands_tx,
                stop: stop_tx,
                task,
            });
        }

        info!(rom, restored, "session running");
        sse_events::broadcast_phase_changed(&self.shared.events, SessionPhase::Running, Some(rom));
        sse_events::broadcast_frame(&self.shared.events, exported.sequence);

        Ok(LoadOutcome {
            rom: rom.to_owned(),
            restored,
        })
    }

    async fn prepare_engine(&self, rom_path: &Path) -> Result<PreparedEngine, EngineError> {
        let mut engine = self.construct(rom_path).await?;

        let restored = match self.shared.persistence.restore().await {
            Ok(bytes) => match engine.load_state(&bytes) {
                Ok(()) => {
                    info!("loaded existing save state");
                    true
                }
                Err(err) => {
                    warn!(error = %err, "failed to load save state; starting fresh");
                    self.shared.persistence.discard_corrupt().await;
                    // The rejected load may have left the engine half-restored.
                    engine = self.construct(rom_path).await?;
                    false
                }
            },
            Err(PersistenceError::NotFound { .. }) => {
                info!("no saves found, starting new run");
                false
            }
            Err(err) => {
                warn!(error = %err, "failed to load save state; starting fresh");
                if matches!(err, PersistenceError::CorruptState { .. }) {
                    self.shared.persistence.discard_corrupt().await;
                }
                false
            }
        };

        let frame = engine.current_frame()?;
        Ok(PreparedEngine {
            engine,
            restored,
            frame,
        })
    }

    async fn construct(&self, rom_path: &Path) -> Result<Box<dyn Engine>, EngineError> {
        let factory = self.shared.factory.clone();
        let path = rom_path.to_path_buf();
        tokio::task::spawn_blocking(move || factory.construct(&path))
            .await
            .map_err(|err| EngineError::Fault(format!("engine construction aborted: {err}")))?
    }

    /// Stop the running session and save the engine state best-effort.
    pub async fn stop(&self) -> Result<StopOutcome, ServiceError> {
        let (run, rom) = {
            let mut core = self.lock_core().await;
            match core.machine.phase() {
                SessionPhase::Running => {}
                SessionPhase::Loading => return Err(ServiceError::SessionBusy),
                SessionPhase::NotLoaded | SessionPhase::Stopped => {
                    return Err(ServiceError::SessionNotActive);
                }
            }
            core.machine
                .apply(SessionEvent::Stop(StopReason::Requested))
                .map_err(|_| ServiceError::SessionNotActive)?;
            (core.run.take(), core.rom.clone())
        };
        sse_events::broadcast_phase_changed(
            &self.shared.events,
            SessionPhase::Stopped,
            rom.as_deref(),
        );
        info!(rom = rom.as_deref().unwrap_or_default(), "stopping session");

        let Some(LoopHandle {
            commands,
            stop,
            task,
        }) = run
        else {
            return Ok(StopOutcome {
                rom,
                saved: false,
                save_error: Some("round loop was not running".into()),
            });
        };

        drop(commands);
        let _ = stop.send(true);
        let exit = task
            .await
            .unwrap_or_else(|err| LoopExit::SaveFailed(format!("round loop aborted: {err}")));

        let (saved, save_error) = match exit {
            LoopExit::Saved => (true, None),
            LoopExit::SaveFailed(reason) => (false, Some(reason)),
            LoopExit::Faulted(reason) => (false, Some(format!("engine fault: {reason}"))),
        };

        Ok(StopOutcome {
            rom,
            saved,
            save_error,
        })
    }

    /// Stop on process exit; a session that is not running is left alone.
    pub async fn shutdown(&self) {
        match self.stop().await {
            Ok(outcome) if outcome.saved => info!("application terminating, game saved"),
            Ok(outcome) => warn!(
                reason = outcome.save_error.as_deref().unwrap_or_default(),
                "application terminating without a save"
            ),
            Err(ServiceError::SessionNotActive) => {}
            Err(err) => warn!(error = %err, "failed to stop session during shutdown"),
        }
    }

    /// Switch between democracy and anarchy.
    pub async fn set_mode(&self, policy: SelectionPolicy) -> SelectionPolicy {
        {
            let mut core = self.lock_core().await;
            core.policy = policy;
        }
        info!(mode = %policy, "selection policy changed");
        sse_events::broadcast_mode_changed(&self.shared.events, policy);
        policy
    }

    /// Snapshot the engine state into the save file.
    pub async fn save(&self) -> Result<(), ServiceError> {
        self.dispatch(|reply| LoopCommand::Save { reply }).await
    }

    /// Ask the loop for the frame currently on screen.
    pub async fn request_frame(&self) -> Result<Frame, ServiceError> {
        self.dispatch(|reply| LoopCommand::Frame { reply }).await
    }

    pub(crate) async fn dispatch<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> LoopCommand,
    ) -> Result<T, ServiceError> {
        let commands = {
            let core = self.lock_core().await;
            core.require_running()?;
            core.command_sender()?
        };
        forward(commands, build).await
    }

    /// Current phase, policy and round.
    pub async fn status(&self) -> SessionStatus {
        let core = self.lock_core().await;
        SessionStatus {
            phase: core.machine.phase(),
            policy: core.policy,
            rom: core.rom.clone(),
            round: core.round.number,
            remaining_secs: if core.machine.is_running() {
                core.remaining_secs(self.shared.settings.tick_interval)
            } else {
                0
            },
            tally: core.round.tally.clone(),
            voters: core.round.voters.len(),
            last_fault: core.last_fault.clone(),
        }
    }
}

/// Send a command to the loop and wait for its reply.
///
/// A closed queue or dropped reply means the loop is gone.
pub(crate) async fn forward<T>(
    commands: mpsc::Sender<LoopCommand>,
    build: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> LoopCommand,
) -> Result<T, ServiceError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    commands
        .send(build(reply_tx))
        .await
        .map_err(|_| ServiceError::SessionNotActive)?;
    reply_rx.await.map_err(|_| ServiceError::SessionNotActive)?
}
