//! Monologue detection
//!
//! A monologue is a run of consecutive messages from one nick. The run is only
//! credited once somebody else speaks, so the open streak is carried over to the
//! next parse run through [`StreakState`].

use crate::types::StreakState;

/// A finished streak that met the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monologue {
    /// Lowercase nick key
    pub nick: String,
    pub length: u64,
}

/// Tracks the current streak across lines (and runs).
#[derive(Debug, Clone)]
pub struct StreakTracker {
    state: StreakState,
    threshold: u64,
}

impl StreakTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            state: StreakState::default(),
            threshold: u64::from(threshold),
        }
    }

    /// Continue from the streak left open by a previous run.
    pub fn restore(&mut self, state: StreakState) {
        self.state = state;
    }

    pub fn state(&self) -> &StreakState {
        &self.state
    }

    /// Register a message from `nick` (lowercase key).
    ///
    /// Returns the streak that `nick` just interrupted, if it was long enough.
    pub fn observe(&mut self, nick: &str) -> Option<Monologue> {
        if self.state.nick == nick {
            self.state.length += 1;
            return None;
        }

        let finished = std::mem::replace(
            &mut self.state,
            StreakState {
                nick: nick.to_string(),
                length: 1,
            },
        );

        (!finished.nick.is_empty() && finished.length >= self.threshold).then(|| Monologue {
            nick: finished.nick,
            length: finished.length,
        })
    }
}
