use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, sleep_until},
};
use tracing::{debug, error, info, warn};

use crate::{
    engine::{Engine, EngineError, Frame},
    error::ServiceError,
    services::{session_controller::ControllerShared, sse_events},
    state::{
        game::Action,
        state_machine::{SessionEvent, SessionPhase, StopReason},
    },
};

/// Work the round loop performs on behalf of other tasks.
pub(crate) enum LoopCommand {
    /// Anarchy press, applied immediately.
    Press {
        action: Action,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    /// Snapshot the engine into the save file.
    Save {
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    /// Render the current screen.
    Frame {
        reply: oneshot::Sender<Result<Frame, ServiceError>>,
    },
}

impl LoopCommand {
    fn reject(self) {
        match self {
            LoopCommand::Press { reply, .. } | LoopCommand::Save { reply } => {
                let _ = reply.send(Err(ServiceError::SessionNotActive));
            }
            LoopCommand::Frame { reply } => {
                let _ = reply.send(Err(ServiceError::SessionNotActive));
            }
        }
    }
}

/// How the loop task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Saved,
    SaveFailed(String),
    Faulted(String),
}

#[derive(Debug, PartialEq, Eq)]
enum TickWait {
    Elapsed,
    Stop,
}

/// Task exclusively owning the engine while a session runs.
pub(crate) struct RoundLoop {
    shared: Arc<ControllerShared>,
    engine: Box<dyn Engine>,
    commands: mpsc::Receiver<LoopCommand>,
    stop: watch::Receiver<bool>,
}

impl RoundLoop {
    pub(crate) fn new(
        shared: Arc<ControllerShared>,
        engine: Box<dyn Engine>,
        commands: mpsc::Receiver<LoopCommand>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            engine,
            commands,
            stop,
        }
    }

    pub(crate) async fn run(mut self) -> LoopExit {
        let result = self.drive().await;

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            command.reject();
        }

        match result {
            Ok(()) => self.save_on_exit().await,
            Err(err) => self.fault(err).await,
        }
    }

    async fn drive(&mut self) -> Result<(), EngineError> {
        let settings = self.shared.settings;

        loop {
            loop {
                if *self.stop.borrow() {
                    return Ok(());
                }

                self.engine.advance(settings.frames_per_tick, true)?;
                self.export_frame().await?;

                let remaining = {
                    let mut core = self.shared.core.lock().await;
                    if !core.machine.is_running() {
                        return Ok(());
                    }
                    core.round.remaining_ticks = core.round.remaining_ticks.saturating_sub(1);
                    core.round.remaining_ticks
                };
                debug!(remaining, "move countdown");

                if self.wait_tick().await? == TickWait::Stop {
                    return Ok(());
                }
                if remaining == 0 {
                    break;
                }
            }

            let (closed, policy) = {
                let mut core = self.shared.core.lock().await;
                if !core.machine.is_running() {
                    return Ok(());
                }
                (core.round.rotate(settings.round_ticks), core.policy)
            };

            match closed.tally.winner() {
                Some(action) => {
                    self.engine.apply_action(action, settings.hold_ticks)?;
                    info!(
                        round = closed.number,
                        action = %action,
                        votes = closed.tally.count(action),
                        "button selection has won this round"
                    );
                }
                None => info!(round = closed.number, "no buttons were pressed this round"),
            }
            sse_events::broadcast_round_result(&self.shared.events, &closed, policy);

            self.export_frame().await?;
        }
    }

    /// Wait out one tick while serving commands; returns early on stop.
    async fn wait_tick(&mut self) -> Result<TickWait, EngineError> {
        let deadline = Instant::now() + self.shared.settings.tick_interval;
        loop {
            tokio::select! {
                biased;
                changed = self.stop.changed() => {
                    if changed.is_err() || *self.stop.borrow() {
                        return Ok(TickWait::Stop);
                    }
                }
                _ = sleep_until(deadline) => return Ok(TickWait::Elapsed),
                Some(command) = self.commands.recv() => self.handle(command).await?,
            }
        }
    }

    async fn handle(&mut self, command: LoopCommand) -> Result<(), EngineError> {
        match command {
            LoopCommand::Press { action, reply } => {
                match self
                    .engine
                    .apply_action(action, self.shared.settings.hold_ticks)
                {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        Ok(())
                    }
                    Err(err) => {
                        let _ = reply.send(Err(ServiceError::Engine(EngineError::Fault(
                            err.to_string(),
                        ))));
                        Err(err)
                    }
                }
            }
            LoopCommand::Save { reply } => {
                let result = self.save().await;
                let _ = reply.send(result);
                Ok(())
            }
            LoopCommand::Frame { reply } => {
                let _ = reply.send(self.engine.current_frame().map_err(ServiceError::Engine));
                Ok(())
            }
        }
    }

    async fn export_frame(&mut self) -> Result<(), EngineError> {
        let frame = self.engine.current_frame()?;
        let exported = self.shared.frames.publish(frame).await;
        sse_events::broadcast_frame(&self.shared.events, exported.sequence);
        Ok(())
    }

    async fn save(&mut self) -> Result<(), ServiceError> {
        let bytes = self.engine.save_state().map_err(ServiceError::Engine)?;
        self.shared
            .persistence
            .save(&bytes)
            .await
            .map_err(ServiceError::Persistence)
    }

    async fn save_on_exit(&mut self) -> LoopExit {
        match self.save().await {
            Ok(()) => LoopExit::Saved,
            Err(err) => {
                warn!(error = %err, "failed to save game state on stop");
                LoopExit::SaveFailed(err.to_string())
            }
        }
    }

    async fn fault(&mut self, err: EngineError) -> LoopExit {
        let message = err.to_string();
        error!(error = %err, "engine failed; stopping session");

        let rom = {
            let mut core = self.shared.core.lock().await;
            match core.machine.apply(SessionEvent::Stop(StopReason::EngineFault)) {
                Ok(_) => {
                    core.last_fault = Some(message.clone());
                    core.run.take();
                    Some(core.rom.clone())
                }
                // A concurrent stop already moved the session on.
                Err(_) => None,
            }
        };

        if let Some(rom) = rom {
            sse_events::broadcast_session_fault(&self.shared.events, &message);
            sse_events::broadcast_phase_changed(
                &self.shared.events,
                SessionPhase::Stopped,
                rom.as_deref(),
            );
        }
        LoopExit::Faulted(message)
    }
}
