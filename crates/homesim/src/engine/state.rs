use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Deserialize;
use serde::Serialize;

use super::history::record_if_changed;
use super::history::trim_history;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// The fixed set of light identifiers.
pub const LIGHT_IDS: RangeInclusive<u8> = 1..=6;

pub const DEFAULT_TEMPERATURE: f64 = 22.0;
pub const DEFAULT_HUMIDITY: f64 = 50.0;

/// A recorded on/off transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEvent {
    pub timestamp: Timestamp,
    pub state: bool,
}

/// A recorded reading of a continuous sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueEvent {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// How long a light stayed on, recorded when it is switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationEvent {
    pub timestamp: Timestamp,
    /// Active interval in milliseconds.
    pub duration: i64,
}

/// Entry in a light's history.
///
/// Persisted without a tag: the variant is identified by whether the record
/// carries a `state` or a `duration` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightEvent {
    State(StateEvent),
    Duration(DurationEvent),
}

impl From<StateEvent> for LightEvent {
    fn from(event: StateEvent) -> Self {
        LightEvent::State(event)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    pub state: bool,

    /// When the light was last switched on. Set iff `state` is true.
    #[serde(default, alias = "timerStart")]
    pub active_since: Option<Timestamp>,

    #[serde(default)]
    pub history: Vec<LightEvent>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinarySensor {
    pub state: bool,
    #[serde(default)]
    pub history: Vec<StateEvent>,
}

impl BinarySensor {
    /// Set the sensor state, recording a transition if it actually changed.
    ///
    /// Returns true if the state changed.
    pub fn set(&mut self, state: bool, now: Timestamp) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        record_if_changed(&mut self.history, state, now);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousSensor {
    pub current: f64,
    #[serde(default)]
    pub history: Vec<ValueEvent>,
}

impl ContinuousSensor {
    pub fn new(current: f64) -> Self {
        Self {
            current,
            history: Vec::new(),
        }
    }

    /// Store a new reading, appending to history only if it differs from the
    /// current value.
    pub fn update(&mut self, value: f64, now: Timestamp) -> bool {
        if value == self.current {
            return false;
        }
        self.current = value;
        self.history.push(ValueEvent {
            timestamp: now,
            value,
        });
        true
    }
}

/// The whole simulated home, persisted as a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub lights: BTreeMap<u8, Light>,
    pub motion_sensor_static: BinarySensor,
    pub gas_sensor: BinarySensor,
    pub motion_sensor_dynamic: BinarySensor,
    pub temperature: ContinuousSensor,
    pub humidity: ContinuousSensor,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            lights: LIGHT_IDS.map(|id| (id, Light::default())).collect(),
            motion_sensor_static: BinarySensor::default(),
            gas_sensor: BinarySensor::default(),
            motion_sensor_dynamic: BinarySensor::default(),
            temperature: ContinuousSensor::new(DEFAULT_TEMPERATURE),
            humidity: ContinuousSensor::new(DEFAULT_HUMIDITY),
        }
    }
}

impl SimulationState {
    /// Make sure every configured light exists, adding missing ones switched off.
    ///
    /// Returns the ids that had to be added.
    pub fn fill_missing_lights(&mut self) -> Vec<u8> {
        let mut added = Vec::new();
        for id in LIGHT_IDS {
            if !self.lights.contains_key(&id) {
                self.lights.insert(id, Light::default());
                added.push(id);
            }
        }
        added
    }

    /// Drop the oldest entries of every history so none exceeds `max` entries.
    pub fn trim_histories(&mut self, max: usize) {
        for light in self.lights.values_mut() {
            trim_history(&mut light.history, max);
        }
        trim_history(&mut self.motion_sensor_static.history, max);
        trim_history(&mut self.gas_sensor.history, max);
        trim_history(&mut self.motion_sensor_dynamic.history, max);
        trim_history(&mut self.temperature.history, max);
        trim_history(&mut self.humidity.history, max);
    }
}

/// Current readings without history, as served by `GET /current`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentReadings {
    pub lights: BTreeMap<u8, bool>,
    pub motion_sensor_static: bool,
    pub gas_sensor: bool,
    pub motion_sensor_dynamic: bool,
    pub temperature: f64,
    pub humidity: f64,
}

impl From<&SimulationState> for CurrentReadings {
    fn from(state: &SimulationState) -> Self {
        Self {
            lights: state
                .lights
                .iter()
                .map(|(id, light)| (*id, light.state))
                .collect(),
            motion_sensor_static: state.motion_sensor_static.state,
            gas_sensor: state.gas_sensor.state,
            motion_sensor_dynamic: state.motion_sensor_dynamic.state,
            temperature: state.temperature.current,
            humidity: state.humidity.current,
        }
    }
}

/// Every entity's history, as served by `GET /history`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Histories {
    pub lights: BTreeMap<u8, Vec<LightEvent>>,
    pub motion_sensor_static: Vec<StateEvent>,
    pub gas_sensor: Vec<StateEvent>,
    pub motion_sensor_dynamic: Vec<StateEvent>,
    pub temperature: Vec<ValueEvent>,
    pub humidity: Vec<ValueEvent>,
}

impl From<SimulationState> for Histories {
    fn from(state: SimulationState) -> Self {
        Self {
            lights: state
                .lights
                .into_iter()
                .map(|(id, light)| (id, light.history))
                .collect(),
            motion_sensor_static: state.motion_sensor_static.history,
            gas_sensor: state.gas_sensor.history,
            motion_sensor_dynamic: state.motion_sensor_dynamic.history,
            temperature: state.temperature.history,
            humidity: state.humidity.history,
        }
    }
}
