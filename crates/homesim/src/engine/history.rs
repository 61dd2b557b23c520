//! Append-only, de-duplicating history logs.

use super::state::LightEvent;
use super::state::StateEvent;
use super::state::Timestamp;

/// A history entry that may carry an on/off state.
pub trait StateRecord: From<StateEvent> {
    /// The recorded state, if this entry records one.
    fn recorded_state(&self) -> Option<bool>;
}

impl StateRecord for StateEvent {
    fn recorded_state(&self) -> Option<bool> {
        Some(self.state)
    }
}

impl StateRecord for LightEvent {
    fn recorded_state(&self) -> Option<bool> {
        match self {
            LightEvent::State(event) => Some(event.state),
            LightEvent::Duration(_) => None,
        }
    }
}

/// Append a state transition unless the last entry already records `state`.
///
/// An empty history, or one ending in an entry without a state, always gets
/// the new entry. Returns true if an entry was appended.
pub fn record_if_changed<E: StateRecord>(history: &mut Vec<E>, state: bool, now: Timestamp) -> bool {
    if history.last().and_then(StateRecord::recorded_state) == Some(state) {
        return false;
    }
    history.push(StateEvent {
        timestamp: now,
        state,
    }
    .into());
    true
}

/// Drop the oldest entries so at most `max` remain.
pub fn trim_history<E>(history: &mut Vec<E>, max: usize) {
    if history.len() > max {
        let excess = history.len() - max;
        history.drain(..excess);
    }
}
