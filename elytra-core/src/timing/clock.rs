//! Wrapped loop time from a free-running monotonic clock.

use std::time::Instant;

use serde::Serialize;

/// Seconds into the current loop, always in `[0, loop_duration)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct LoopTime(f64);

impl LoopTime {
    pub fn as_secs(self) -> f64 {
        self.0
    }
}

/// Loop clock anchored at the first frame it observes.
///
/// Elapsed time is measured from the first `tick`, not from any epoch, so a
/// presentation always opens at `t = 0` regardless of when it was mounted.
#[derive(Debug, Clone)]
pub struct LoopClock {
    loop_duration: f64,
    start: Option<Instant>,
}

impl LoopClock {
    /// # Panics
    /// If `loop_duration` is not a positive finite number.
    pub fn new(loop_duration: f64) -> Self {
        assert!(
            loop_duration.is_finite() && loop_duration > 0.0,
            "loop duration must be positive, got {loop_duration}"
        );
        Self {
            loop_duration,
            start: None,
        }
    }

    /// Wrapped loop time for a frame timestamp.
    ///
    /// The first call captures `now` as the loop origin. Timestamps earlier
    /// than the origin saturate to zero.
    pub fn tick(&mut self, now: Instant) -> LoopTime {
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start).as_secs_f64();
        LoopTime(self.wrap(elapsed))
    }

    /// Forget the origin; the next tick restarts the loop at zero.
    pub fn reset(&mut self) {
        self.start = None;
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn loop_duration(&self) -> f64 {
        self.loop_duration
    }

    fn wrap(&self, elapsed: f64) -> f64 {
        let t = elapsed % self.loop_duration;
        // `%` can land exactly on the duration through rounding for huge inputs.
        if t >= self.loop_duration || t < 0.0 {
            0.0
        } else {
            t
        }
    }
}
