use thiserror::Error;

/// Lifecycle phases of the emulated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No ROM has been loaded yet.
    NotLoaded,
    /// The engine is being built and its saved state restored.
    Loading,
    /// Rounds are ticking and inputs are accepted.
    Running,
    /// The engine was torn down; a new load may start over.
    Stopped,
}

/// Why a running session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator (or process shutdown) asked for it.
    Requested,
    /// The engine failed while ticking.
    EngineFault,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Operator asked to load a ROM.
    Load,
    /// Engine is constructed and restored.
    EngineReady,
    /// Engine construction failed.
    LoadFailed,
    /// The round loop must end.
    Stop(StopReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine guarding the session lifecycle.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::NotLoaded,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether rounds are currently ticking.
    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Running
    }

    /// Apply `event`, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::NotLoaded | SessionPhase::Stopped, SessionEvent::Load) => {
                SessionPhase::Loading
            }
            (SessionPhase::Loading, SessionEvent::EngineReady) => SessionPhase::Running,
            (SessionPhase::Loading, SessionEvent::LoadFailed) => SessionPhase::NotLoaded,
            (SessionPhase::Running, SessionEvent::Stop(_)) => SessionPhase::Stopped,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_not_loaded() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::NotLoaded);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(sm.apply(SessionEvent::Load), Ok(SessionPhase::Loading));
        assert_eq!(sm.apply(SessionEvent::EngineReady), Ok(SessionPhase::Running));
        assert!(sm.is_running());
        assert_eq!(
            sm.apply(SessionEvent::Stop(StopReason::Requested)),
            Ok(SessionPhase::Stopped)
        );
        assert_eq!(sm.apply(SessionEvent::Load), Ok(SessionPhase::Loading));
    }

    #[test]
    fn failed_load_returns_to_not_loaded() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::Load).unwrap();
        assert_eq!(sm.apply(SessionEvent::LoadFailed), Ok(SessionPhase::NotLoaded));
    }

    #[test]
    fn load_is_rejected_while_busy() {
        let mut sm = SessionStateMachine::new();
        sm.apply(SessionEvent::Load).unwrap();

        let err = sm.apply(SessionEvent::Load).unwrap_err();
        assert_eq!(err.from, SessionPhase::Loading);

        sm.apply(SessionEvent::EngineReady).unwrap();
        let err = sm.apply(SessionEvent::Load).unwrap_err();
        assert_eq!(err.from, SessionPhase::Running);
        assert_eq!(sm.phase(), SessionPhase::Running);
    }

    #[test]
    fn stop_requires_running() {
        let mut sm = SessionStateMachine::new();
        let err = sm
            .apply(SessionEvent::Stop(StopReason::EngineFault))
            .unwrap_err();
        assert_eq!(err.from, SessionPhase::NotLoaded);
        assert_eq!(sm.phase(), SessionPhase::NotLoaded);
    }
}
