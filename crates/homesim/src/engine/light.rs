use super::error::SimError;
use super::history::record_if_changed;
use super::state::DurationEvent;
use super::state::Light;
use super::state::LightEvent;
use super::state::SimulationState;
use super::state::Timestamp;

/// Result of a light command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightChange {
    /// The light was already in the requested state.
    Unchanged,
    TurnedOn,
    /// The light was switched off after `duration` milliseconds on.
    TurnedOff { duration: i64 },
}

impl Light {
    /// Switch the light, tracking how long it stays on.
    pub fn switch(&mut self, on: bool, now: Timestamp) -> LightChange {
        if self.state == on {
            return LightChange::Unchanged;
        }

        let change = if on {
            self.active_since = Some(now);
            LightChange::TurnedOn
        } else {
            let duration = self
                .active_since
                .take()
                .map_or(0, |since| now.saturating_sub(since).max(0));
            self.history.push(LightEvent::Duration(DurationEvent {
                timestamp: now,
                duration,
            }));
            LightChange::TurnedOff { duration }
        };

        self.state = on;
        record_if_changed(&mut self.history, on, now);
        change
    }
}

/// Parse a light id sent as a string.
///
/// Only the canonical form matches: `"3"` names light 3, `"03"`, `"+3"` and
/// `" 3"` name nothing.
pub fn parse_light_id(raw: &str) -> Result<u8, SimError> {
    raw.parse::<u8>()
        .ok()
        .filter(|id| id.to_string() == raw)
        .ok_or_else(|| SimError::LightNotFound(raw.to_string()))
}

/// Resolve a light id sent as a JSON number.
///
/// Integral values (including `1.0`) name a light; anything else names nothing.
pub fn light_id_from_number(number: &serde_json::Number) -> Result<u8, SimError> {
    let not_found = || SimError::LightNotFound(number.to_string());
    if let Some(n) = number.as_u64() {
        return u8::try_from(n).map_err(|_| not_found());
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&f) => Ok(f as u8),
        _ => Err(not_found()),
    }
}

/// Apply a light command to `state`.
pub fn set_light(
    state: &mut SimulationState,
    light_id: u8,
    on: bool,
    now: Timestamp,
) -> Result<LightChange, SimError> {
    let light = state
        .lights
        .get_mut(&light_id)
        .ok_or_else(|| SimError::LightNotFound(light_id.to_string()))?;
    Ok(light.switch(on, now))
}
