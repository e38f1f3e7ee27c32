//! Randomized chirp timing.
//!
//! The scheduler keeps exactly one armed entry in its `TimerQueue` while it
//! runs. When that entry comes due, a `ChirpEvent` is drawn and the next
//! entry is armed `U[2 s, 5 s)` after the dispatch, unless the stop flag is
//! set. A late poll therefore yields one chirp, never a backlog. Nothing here touches audio: the caller hands the
//! returned events to the render graph.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::audio::chirp::ChirpEvent;
use crate::audio::diagnostics::AudioDiagnostics;
use crate::config::AmbienceConfig;
use crate::engine::timer::{TimerHandle, TimerQueue};
use crate::error::Result;

/// Payload of a chirp timer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextChirp;

pub struct ChirpScheduler {
    timers: TimerQueue<NextChirp>,
    rng: StdRng,
    delay: (Duration, Duration),
    start_hz: (f64, f64),
    end_hz: (f64, f64),
    stop: Arc<AtomicBool>,
    running: bool,
    diagnostics: Arc<AudioDiagnostics>,
}

impl ChirpScheduler {
    /// # Errors
    /// `ElytraError::InvalidAmbience` when a delay or frequency range is empty.
    pub fn new(
        config: &AmbienceConfig,
        rng: StdRng,
        stop: Arc<AtomicBool>,
        diagnostics: Arc<AudioDiagnostics>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            timers: TimerQueue::new(),
            rng,
            delay: config.chirp_delay,
            start_hz: config.chirp_start_hz,
            end_hz: config.chirp_end_hz,
            stop,
            running: false,
            diagnostics,
        })
    }

    /// Draw one inter-chirp delay from the half-open delay range.
    pub fn sample_delay(&mut self) -> Duration {
        self.rng.gen_range(self.delay.0..self.delay.1)
    }

    /// Draw one chirp starting at `start_time` (audio-context seconds).
    pub fn sample_event(&mut self, start_time: f64) -> ChirpEvent {
        ChirpEvent {
            start_frequency: self.rng.gen_range(self.start_hz.0..self.start_hz.1),
            end_frequency: self.rng.gen_range(self.end_hz.0..self.end_hz.1),
            start_time,
        }
    }

    /// Arm the first chirp relative to `now`. Returns `false` if already
    /// running or stopped.
    pub fn start(&mut self, now: Duration) -> bool {
        if self.running || self.is_stopped() {
            return false;
        }
        self.running = true;
        self.arm(now);
        true
    }

    /// Fire the armed entry if it is due at `now`.
    ///
    /// The next entry is armed from `now`, not from the missed deadline, so
    /// chirps stay at least the minimum delay apart however late the poll.
    pub fn poll(&mut self, now: Duration, context_time: f64) -> Option<ChirpEvent> {
        self.timers.pop_due(now)?;
        if self.is_stopped() {
            self.running = false;
            return None;
        }
        let event = self.sample_event(context_time);
        debug!(
            start_hz = event.start_frequency,
            end_hz = event.end_frequency,
            at = event.start_time,
            "chirp"
        );
        AudioDiagnostics::incr(&self.diagnostics.chirps_dispatched);
        self.arm(now);
        Some(event)
    }

    /// Cancel every pending entry. The scheduler stays idle until `start`.
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        self.running = false;
        if cancelled > 0 {
            AudioDiagnostics::add(&self.diagnostics.timers_cancelled, cancelled);
        }
        cancelled
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn pending_len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.is_stopped()
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn arm(&mut self, from: Duration) -> TimerHandle {
        let delay = self.sample_delay();
        AudioDiagnostics::incr(&self.diagnostics.chirps_scheduled);
        self.timers.schedule(from + delay, NextChirp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElytraError;
    use rand::SeedableRng;

    fn scheduler(seed: u64) -> (ChirpScheduler, Arc<AtomicBool>) {
        let stop = Arc::new(AtomicBool::new(false));
        let scheduler = ChirpScheduler::new(
            &AmbienceConfig::default(),
            StdRng::seed_from_u64(seed),
            Arc::clone(&stop),
            Arc::new(AudioDiagnostics::default()),
        )
        .expect("default ranges are valid");
        (scheduler, stop)
    }

    #[test]
    fn delays_stay_in_range() {
        let (mut scheduler, _) = scheduler(11);
        for _ in 0..10_000 {
            let delay = scheduler.sample_delay();
            assert!(delay >= Duration::from_millis(2000), "{delay:?}");
            assert!(delay < Duration::from_millis(5000), "{delay:?}");
        }
    }

    #[test]
    fn sweeps_stay_in_range() {
        let (mut scheduler, _) = scheduler(12);
        for _ in 0..10_000 {
            let event = scheduler.sample_event(1.5);
            assert!((1000.0..1400.0).contains(&event.start_frequency));
            assert!((500.0..700.0).contains(&event.end_frequency));
            assert_eq!(event.start_time, 1.5);
        }
    }

    #[test]
    fn start_arms_exactly_one_entry() {
        let (mut scheduler, _) = scheduler(13);
        assert!(scheduler.start(Duration::ZERO));
        assert!(!scheduler.start(Duration::ZERO));
        assert_eq!(scheduler.pending_len(), 1);
        assert!(scheduler.is_running());

        let deadline = scheduler.next_deadline().expect("armed");
        assert!(deadline >= Duration::from_secs(2) && deadline < Duration::from_secs(5));
    }

    #[test]
    fn firing_re_arms_after_dispatch() {
        let (mut scheduler, _) = scheduler(14);
        scheduler.start(Duration::ZERO);
        let first = scheduler.next_deadline().expect("armed");

        assert!(scheduler.poll(first - Duration::from_millis(1), 0.0).is_none());
        let event = scheduler.poll(first, 3.0).expect("due entry fires");
        assert_eq!(event.start_time, 3.0);
        assert_eq!(scheduler.pending_len(), 1);

        let second = scheduler.next_deadline().expect("re-armed");
        let gap = second - first;
        assert!(gap >= Duration::from_secs(2) && gap < Duration::from_secs(5));
    }

    #[test]
    fn late_poll_fires_once_and_re_arms_from_now() {
        let (mut scheduler, _) = scheduler(15);
        scheduler.start(Duration::ZERO);
        let late = Duration::from_secs(20);

        assert!(scheduler.poll(late, 20.0).is_some());
        assert!(scheduler.poll(late, 20.0).is_none());
        assert_eq!(scheduler.pending_len(), 1);

        let next = scheduler.next_deadline().expect("re-armed");
        assert!(next >= late + Duration::from_secs(2), "{next:?}");
        assert!(next < late + Duration::from_secs(5), "{next:?}");
        assert_eq!(scheduler.diagnostics.snapshot().chirps_dispatched, 1);
    }

    #[test]
    fn empty_ranges_are_rejected() {
        let delay = Duration::from_secs(3);
        let config = AmbienceConfig {
            chirp_delay: (delay, delay),
            ..AmbienceConfig::default()
        };
        let result = ChirpScheduler::new(
            &config,
            StdRng::seed_from_u64(18),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AudioDiagnostics::default()),
        );
        assert!(matches!(result, Err(ElytraError::InvalidAmbience(_))));
    }

    #[test]
    fn stop_flag_halts_rescheduling() {
        let (mut scheduler, stop) = scheduler(16);
        scheduler.start(Duration::ZERO);
        stop.store(true, Ordering::Release);

        assert!(scheduler.poll(Duration::from_secs(10), 10.0).is_none());
        assert_eq!(scheduler.pending_len(), 0);
        assert!(!scheduler.is_running());
        assert!(!scheduler.start(Duration::from_secs(10)));
    }

    #[test]
    fn cancel_all_empties_pending() {
        let (mut scheduler, _) = scheduler(17);
        scheduler.start(Duration::ZERO);
        assert_eq!(scheduler.cancel_all(), 1);
        assert_eq!(scheduler.pending_len(), 0);
        assert!(scheduler.poll(Duration::from_secs(60), 60.0).is_none());
        assert_eq!(scheduler.diagnostics.snapshot().timers_cancelled, 1);
    }

    #[test]
    fn same_seed_same_chirps() {
        let (mut a, _) = scheduler(99);
        let (mut b, _) = scheduler(99);
        a.start(Duration::ZERO);
        b.start(Duration::ZERO);
        for step in 1..=300u64 {
            let now = Duration::from_millis(step * 100);
            assert_eq!(a.poll(now, 0.0), b.poll(now, 0.0));
        }
        assert_eq!(a.next_deadline(), b.next_deadline());
    }
}
