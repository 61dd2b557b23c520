use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::burst::BurstPhase;
use super::burst::BurstTiming;
use super::burst::MotionBurst;
use super::drift::drift;
use super::error::SimError;
use super::light::LightChange;
use super::light::set_light;
use super::state::LightEvent;
use super::state::SimulationState;
use super::state::Timestamp;
use super::store::Store;

/// Tunables for the engine, normally taken from the `[simulation]` config table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub tick_interval: Duration,
    pub burst: BurstTiming,
    /// Upper bound on every history, if retention is limited.
    pub max_history: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(3 * 60),
            burst: BurstTiming::default(),
            max_history: None,
        }
    }
}

/// Everything guarded by the engine lock.
struct Inner {
    store: Box<dyn Store>,
    rng: StdRng,
    burst: MotionBurst,
}

/// homesim engine
///
/// Owns the store and the motion burst scheduler. Every load -> mutate -> save
/// sequence (ticks, light commands and burst phases) runs under a single lock,
/// so no update can be lost to a concurrent save.
///
/// Cloning the engine yields another handle to the same simulation.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<Inner>>,
    settings: Arc<EngineSettings>,
}

fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

impl Engine {
    /// Create an engine over `store` with an OS-seeded RNG.
    pub fn new(store: Box<dyn Store>, settings: EngineSettings) -> Self {
        Self::with_rng(store, settings, StdRng::from_os_rng())
    }

    /// Create an engine with a caller-provided RNG (deterministic in tests).
    pub fn with_rng(store: Box<dyn Store>, settings: EngineSettings, rng: StdRng) -> Self {
        let burst = MotionBurst::new(settings.burst.clone());
        Self {
            inner: Arc::new(Mutex::new(Inner { store, rng, burst })),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Load the current document.
    pub async fn snapshot(&self) -> SimulationState {
        self.inner.lock().await.store.load()
    }

    /// Current phase of the motion burst scheduler.
    pub async fn burst_phase(&self) -> BurstPhase {
        self.inner.lock().await.burst.phase()
    }

    /// Run one tick: drift the sensors, arm a motion burst if none is in
    /// flight, and save.
    ///
    /// The document is saved even when nothing changed.
    pub async fn tick(&self) -> Result<SimulationState, SimError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut state = inner.store.load();
        let outcome = drift(&mut state, &mut inner.rng, now_millis());
        debug!(
            "Tick: temperature={} humidity={} ({:?})",
            state.temperature.current, state.humidity.current, outcome
        );

        if let Some(delay) = inner.burst.try_arm(&mut inner.rng) {
            info!("Motion burst armed, firing in {:?}", delay);
            let task = tokio::spawn(run_burst(self.clone(), delay));
            inner.burst.attach(task);
        }

        self.retain(&mut state);
        inner.store.save(&state)?;
        Ok(state)
    }

    /// Switch a light on or off.
    ///
    /// A command matching the current state changes nothing and saves
    /// nothing. Returns the light's full history.
    pub async fn set_light(&self, light_id: u8, on: bool) -> Result<Vec<LightEvent>, SimError> {
        let mut inner = self.inner.lock().await;

        let mut state = inner.store.load();
        let change = set_light(&mut state, light_id, on, now_millis())?;
        if change != LightChange::Unchanged {
            info!("Light {} -> on={} ({:?})", light_id, on, change);
            self.retain(&mut state);
            inner.store.save(&state)?;
        }

        Ok(state
            .lights
            .remove(&light_id)
            .map(|light| light.history)
            .unwrap_or_default())
    }

    /// Stop any pending motion burst.
    ///
    /// An active burst is cut short: the dynamic motion sensor is switched
    /// off and saved so it does not stay on across a restart.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let phase = inner.burst.phase();
        if phase != BurstPhase::Idle {
            info!("Cancelling {} motion burst", phase);
        }
        inner.burst.cancel();

        if phase == BurstPhase::Active {
            let mut state = inner.store.load();
            if state.motion_sensor_dynamic.set(false, now_millis()) {
                self.retain(&mut state);
                if let Err(e) = inner.store.save(&state) {
                    error!("Failed to save motion burst end on shutdown: {}", e);
                }
            }
        }
    }

    /// Spawn the periodic tick driver.
    ///
    /// The first tick fires one period from now; run [`Engine::tick`] directly
    /// for the startup tick.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let period = self.settings.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = engine.tick().await {
                    error!("Scheduled tick failed: {}", e);
                }
            }
        })
    }

    fn retain(&self, state: &mut SimulationState) {
        if let Some(max) = self.settings.max_history {
            state.trim_histories(max);
        }
    }

    /// Switch the dynamic motion sensor on and move the burst to `Active`.
    ///
    /// Returns how long the sensor should stay on, or `None` if the burst
    /// did not survive this phase.
    async fn motion_on(&self) -> Option<Duration> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut state = inner.store.load();
        state.motion_sensor_dynamic.set(true, now_millis());
        self.retain(&mut state);
        if let Err(e) = inner.store.save(&state) {
            error!("Failed to save motion burst start, abandoning burst: {}", e);
            inner.burst.finish();
            return None;
        }

        let active = inner.burst.activate(&mut inner.rng);
        if let Some(active) = active {
            info!("Motion detected, clearing in {:?}", active);
        }
        active
    }

    /// Switch the dynamic motion sensor off and return the burst to `Idle`.
    async fn motion_off(&self) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let mut state = inner.store.load();
        state.motion_sensor_dynamic.set(false, now_millis());
        self.retain(&mut state);
        if let Err(e) = inner.store.save(&state) {
            error!("Failed to save motion burst end: {}", e);
        }

        info!("Motion cleared");
        inner.burst.finish();
    }
}

/// Drive one armed burst through its remaining phases.
async fn run_burst(engine: Engine, arm_delay: Duration) {
    tokio::time::sleep(arm_delay).await;
    let Some(active) = engine.motion_on().await else {
        return;
    };
    tokio::time::sleep(active).await;
    engine.motion_off().await;
}
