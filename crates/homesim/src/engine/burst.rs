//! Motion burst scheduling for the dynamic motion sensor.
//!
//! A burst is one `Idle -> Armed -> Active -> Idle` cycle. Only one burst can
//! be in flight; arming is refused unless the scheduler is idle.

use std::ops::Range;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;

/// Phase of the motion burst state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BurstPhase {
    /// No burst pending.
    Idle,
    /// Waiting to switch the sensor on.
    Armed,
    /// Sensor is on, waiting to switch it off.
    Active,
}

/// Delay ranges for a burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurstTiming {
    /// Delay between arming and switching the sensor on.
    pub arm_delay: Range<Duration>,
    /// How long the sensor stays on.
    pub active: Range<Duration>,
}

impl Default for BurstTiming {
    fn default() -> Self {
        Self {
            arm_delay: Duration::from_secs(3 * 60)..Duration::from_secs(5 * 60),
            active: Duration::from_secs(1)..Duration::from_secs(5),
        }
    }
}

/// Owns the burst phase and the task driving the pending phase.
#[derive(Debug)]
pub struct MotionBurst {
    phase: BurstPhase,
    timing: BurstTiming,
    task: Option<JoinHandle<()>>,
}

impl MotionBurst {
    pub fn new(timing: BurstTiming) -> Self {
        Self {
            phase: BurstPhase::Idle,
            timing,
            task: None,
        }
    }

    pub fn phase(&self) -> BurstPhase {
        self.phase
    }

    /// Arm a new burst if none is in flight.
    ///
    /// Returns the delay before the sensor should switch on, or `None` if a
    /// burst is already armed or active.
    pub fn try_arm<R: Rng>(&mut self, rng: &mut R) -> Option<Duration> {
        if self.phase != BurstPhase::Idle || self.task.is_some() {
            return None;
        }
        self.phase = BurstPhase::Armed;
        Some(rng.random_range(self.timing.arm_delay.clone()))
    }

    /// Attach the task that drives the armed burst.
    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    /// Move from `Armed` to `Active`.
    ///
    /// Returns how long the sensor should stay on, or `None` if no burst was
    /// armed.
    pub fn activate<R: Rng>(&mut self, rng: &mut R) -> Option<Duration> {
        if self.phase != BurstPhase::Armed {
            return None;
        }
        self.phase = BurstPhase::Active;
        Some(rng.random_range(self.timing.active.clone()))
    }

    /// Return to `Idle` once the burst has run its course.
    ///
    /// The driving task is released, not aborted: it is the caller.
    pub fn finish(&mut self) {
        self.phase = BurstPhase::Idle;
        self.task = None;
    }

    /// Abort any pending phase and return to `Idle`.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.phase = BurstPhase::Idle;
    }
}

impl Drop for MotionBurst {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut burst = MotionBurst::new(BurstTiming::default());
        assert_eq!(burst.phase(), BurstPhase::Idle);

        let delay = burst.try_arm(&mut rng).unwrap();
        assert!(delay >= Duration::from_secs(180) && delay < Duration::from_secs(300));
        assert_eq!(burst.phase(), BurstPhase::Armed);

        let active = burst.activate(&mut rng).unwrap();
        assert!(active >= Duration::from_secs(1) && active < Duration::from_secs(5));
        assert_eq!(burst.phase(), BurstPhase::Active);

        burst.finish();
        assert_eq!(burst.phase(), BurstPhase::Idle);
        assert!(burst.try_arm(&mut rng).is_some());
    }

    #[test]
    fn test_arming_is_exclusive() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut burst = MotionBurst::new(BurstTiming::default());

        assert!(burst.try_arm(&mut rng).is_some());
        assert!(burst.try_arm(&mut rng).is_none());

        burst.activate(&mut rng);
        assert!(burst.try_arm(&mut rng).is_none());
        assert_eq!(burst.phase(), BurstPhase::Active);
    }

    #[test]
    fn test_activate_requires_armed() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut burst = MotionBurst::new(BurstTiming::default());
        assert!(burst.activate(&mut rng).is_none());
        assert_eq!(burst.phase(), BurstPhase::Idle);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(BurstPhase::Armed.to_string(), "armed");
        let name: &'static str = BurstPhase::Active.into();
        assert_eq!(name, "active");
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut burst = MotionBurst::new(BurstTiming::default());
        burst.try_arm(&mut rng).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        burst.attach(task);

        burst.cancel();
        assert_eq!(burst.phase(), BurstPhase::Idle);
        // The sender is dropped with the aborted task.
        assert!(rx.await.is_err());
    }
}
