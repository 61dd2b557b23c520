//! Bounded random walk for the continuous sensors.

use rand::Rng;

use super::state::SimulationState;
use super::state::Timestamp;

/// Random-walk parameters for one continuous sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftRange {
    /// Largest step per tick in either direction.
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

pub const TEMPERATURE: DriftRange = DriftRange {
    step: 0.1,
    min: 18.0,
    max: 26.0,
};

pub const HUMIDITY: DriftRange = DriftRange {
    step: 3.0,
    min: 30.0,
    max: 80.0,
};

impl DriftRange {
    /// Apply `delta` to `current`, round to one decimal and clamp.
    pub fn apply(&self, current: f64, delta: f64) -> f64 {
        round_tenth(current + delta).clamp(self.min, self.max)
    }

    /// Draw a delta uniformly from `[-step, step)`.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.random_range(-self.step..self.step)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// What a drift pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriftOutcome {
    pub temperature_changed: bool,
    pub humidity_changed: bool,
    pub motion_static_idled: bool,
    pub gas_idled: bool,
}

/// Run one drift pass over `state`.
///
/// Temperature and humidity take a random step; the static motion and gas
/// sensors fall back to `false`.
pub fn drift<R: Rng>(state: &mut SimulationState, rng: &mut R, now: Timestamp) -> DriftOutcome {
    let temperature = TEMPERATURE.apply(state.temperature.current, TEMPERATURE.sample(rng));
    let humidity = HUMIDITY.apply(state.humidity.current, HUMIDITY.sample(rng));

    DriftOutcome {
        temperature_changed: state.temperature.update(temperature, now),
        humidity_changed: state.humidity.update(humidity, now),
        motion_static_idled: state.motion_sensor_static.set(false, now),
        gas_idled: state.gas_sensor.set(false, now),
    }
}
