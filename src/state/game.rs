use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Buttons of the emulated pad, in tie-break priority order.
///
/// The declaration order is significant: when several buttons share the
/// highest vote count, the one declared first wins the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The `A` face button.
    A,
    /// The `B` face button.
    B,
    /// The `SELECT` button.
    Select,
    /// The `START` button.
    Start,
    /// D-pad up.
    Up,
    /// D-pad down.
    Down,
    /// D-pad left.
    Left,
    /// D-pad right.
    Right,
}

impl Action {
    /// Number of buttons in the alphabet.
    pub const COUNT: usize = 8;

    /// Every button, in tie-break priority order.
    pub const ALL: [Action; Action::COUNT] = [
        Action::A,
        Action::B,
        Action::Select,
        Action::Start,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
    ];

    /// Lowercase wire name of the button.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::A => "a",
            Action::B => "b",
            Action::Select => "select",
            Action::Start => "start",
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
        }
    }

    /// Position of the button inside [`Action::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string does not name a pad button.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown button `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| UnknownAction(value.to_owned()))
    }
}

/// How submitted buttons turn into engine input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// One vote per participant per round; the most voted button wins.
    #[default]
    Democracy,
    /// Every press goes straight to the engine.
    Anarchy,
}

impl SelectionPolicy {
    /// Lowercase name used in messages and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionPolicy::Democracy => "democracy",
            SelectionPolicy::Anarchy => "anarchy",
        }
    }

    /// Upper-case tag prefixed to participant replies.
    pub fn tag(self) -> &'static str {
        match self {
            SelectionPolicy::Democracy => "DEMOCRACY",
            SelectionPolicy::Anarchy => "ANARCHY",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a mode string is neither `democracy` nor `anarchy`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mode `{0}`: use 'democracy' or 'anarchy'")]
pub struct UnknownPolicy(pub String);

impl FromStr for SelectionPolicy {
    type Err = UnknownPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "democracy" => Ok(SelectionPolicy::Democracy),
            "anarchy" => Ok(SelectionPolicy::Anarchy),
            _ => Err(UnknownPolicy(value.to_owned())),
        }
    }
}

/// Chat-platform identifier of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    /// Raw numeric identifier.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raised when a participant id is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid participant id `{0}`: expected a positive integer")]
pub struct InvalidParticipant(pub String);

impl FromStr for ParticipantId {
    type Err = InvalidParticipant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(ParticipantId(id)),
            _ => Err(InvalidParticipant(value.to_owned())),
        }
    }
}
