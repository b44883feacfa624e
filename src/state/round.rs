use std::collections::HashSet;

use crate::state::game::{Action, ParticipantId};

/// Vote counter covering every button of the pad.
///
/// Counts live in an array indexed by [`Action::index`], so every button is
/// always present, including the ones nobody pressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundTally {
    counts: [u32; Action::COUNT],
}

impl RoundTally {
    /// Create an all-zero tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more vote for `action`.
    pub fn record(&mut self, action: Action) {
        let slot = &mut self.counts[action.index()];
        *slot = slot.saturating_add(1);
    }

    /// Votes received by `action`.
    pub fn count(&self, action: Action) -> u32 {
        self.counts[action.index()]
    }

    /// Sum of every vote in the tally.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&count| u64::from(count)).sum()
    }

    /// Whether no vote has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&count| count == 0)
    }

    /// Most voted button, or `None` for an empty tally.
    ///
    /// Ties go to the button declared first in [`Action::ALL`].
    pub fn winner(&self) -> Option<Action> {
        let mut best: Option<(Action, u32)> = None;
        for action in Action::ALL {
            let count = self.count(action);
            if count == 0 {
                continue;
            }
            match best {
                Some((_, top)) if top >= count => {}
                _ => best = Some((action, count)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Fresh all-zero tally.
    pub fn reset(&self) -> Self {
        Self::new()
    }

    /// `(button, votes)` pairs in alphabet order, zero entries included.
    pub fn entries(&self) -> impl Iterator<Item = (Action, u32)> + '_ {
        Action::ALL
            .into_iter()
            .map(move |action| (action, self.count(action)))
    }
}

/// Participants who already voted in the current round.
pub type ParticipantSet = HashSet<ParticipantId>;

/// Everything that belongs to a single democracy round.
#[derive(Debug, Clone)]
pub struct Round {
    /// Sequence number of the round since the session started.
    pub number: u64,
    /// Votes gathered so far.
    pub tally: RoundTally,
    /// Voters already counted in `tally`.
    pub voters: ParticipantSet,
    /// Ticks left before the round closes.
    pub remaining_ticks: u32,
}

impl Round {
    /// Open round `number` with a full countdown.
    pub fn new(number: u64, ticks: u32) -> Self {
        Self {
            number,
            tally: RoundTally::new(),
            voters: ParticipantSet::new(),
            remaining_ticks: ticks,
        }
    }

    /// Close this round and open the next one, returning the closed round.
    pub fn rotate(&mut self, ticks: u32) -> Round {
        let next = Round::new(self.number + 1, ticks);
        std::mem::replace(self, next)
    }

    /// Record a vote unless `participant` already voted this round.
    ///
    /// Returns `false` when the vote was rejected as a duplicate.
    pub fn vote(&mut self, participant: ParticipantId, action: Action) -> bool {
        if !self.voters.insert(participant) {
            return false;
        }
        self.tally.record(action);
        true
    }
}
