use time::OffsetDateTime;
use tracing::info;

use crate::{
    error::ServiceError,
    services::{
        round_loop::LoopCommand,
        session_controller::{SessionController, forward},
    },
    state::{
        game::{Action, ParticipantId, SelectionPolicy},
        round::RoundTally,
    },
};

/// What happened to an accepted press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Democracy: the vote was counted in the current round.
    Counted {
        round: u64,
        action: Action,
        tally: RoundTally,
        remaining_secs: u64,
    },
    /// Anarchy: the engine already received the press.
    Applied { round: u64, action: Action },
}

impl SubmitOutcome {
    /// Policy the press was handled under.
    pub fn policy(&self) -> SelectionPolicy {
        match self {
            SubmitOutcome::Counted { .. } => SelectionPolicy::Democracy,
            SubmitOutcome::Applied { .. } => SelectionPolicy::Anarchy,
        }
    }

    /// Button that was pressed.
    pub fn action(&self) -> Action {
        match self {
            SubmitOutcome::Counted { action, .. } | SubmitOutcome::Applied { action, .. } => *action,
        }
    }

    /// Reply shown to the participant, e.g. `(DEMOCRACY) Submitted move input for up.`
    pub fn message(&self) -> String {
        format!(
            "({}) Submitted move input for {}.",
            self.policy().tag(),
            self.action()
        )
    }
}

enum Route {
    Counted(SubmitOutcome),
    Forward {
        round: u64,
        commands: tokio::sync::mpsc::Sender<LoopCommand>,
    },
}

/// Validate one press and route it under the active policy.
///
/// Democracy votes are counted under the session lock; anarchy presses are
/// handed to the round loop, which owns the engine. Accepted presses are
/// logged to the analytics store in the background.
pub async fn submit(
    controller: &SessionController,
    participant: ParticipantId,
    action: &str,
) -> Result<SubmitOutcome, ServiceError> {
    let action: Action = action.parse()?;

    let route = {
        let mut core = controller.lock_core().await;
        core.require_running()?;

        match core.policy {
            SelectionPolicy::Democracy => {
                let remaining_secs = core.remaining_secs(controller.settings().tick_interval);
                if !core.round.vote(participant, action) {
                    return Err(ServiceError::DuplicateVote { remaining_secs });
                }
                Route::Counted(SubmitOutcome::Counted {
                    round: core.round.number,
                    action,
                    tally: core.round.tally.clone(),
                    remaining_secs,
                })
            }
            SelectionPolicy::Anarchy => Route::Forward {
                round: core.round.number,
                commands: core.command_sender()?,
            },
        }
    };

    let outcome = match route {
        Route::Counted(outcome) => outcome,
        Route::Forward { round, commands } => {
            forward(commands, |reply| LoopCommand::Press { action, reply }).await?;
            SubmitOutcome::Applied { round, action }
        }
    };

    info!(participant = %participant, action = %action, policy = %outcome.policy(), "move submitted");
    controller
        .persistence()
        .log_move(participant, action, OffsetDateTime::now_utc());

    Ok(outcome)
}
