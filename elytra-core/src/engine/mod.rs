//! `AmbientAudioEngine`: lifecycle controller for the forest ambience.
//!
//! ## Lifecycle
//!
//! ```text
//! AmbientAudioEngine::new(config, context, drive)?  status = Uninitialized
//!     ├─► start()                  activates now if the context is not suspended
//!     ├─► notify_user_gesture()    consumed once; activates
//!     │       └─► activate()       resume → connect noise → arm chirps   status = Active
//!     └─► teardown() / Drop        stop flag → cancel timers → noise off
//!                                  → master off → close context          status = Stopped
//! ```
//!
//! Activation is idempotent and never fails loudly: no context, a context
//! that refuses to resume, or a closed context all leave the engine inert in
//! `Uninitialized` with a `warn!`. Teardown is idempotent and synchronous;
//! when it returns the timer thread has been joined and the graph is silent.
//!
//! ## Threading
//!
//! The engine owns the `AudioContext`, which is `!Send` when backed by cpal.
//! Keep the engine on the thread that opened the context. Chirp timing runs
//! either on its own thread (`TimerDrive::Thread`) or on the caller's
//! simulated clock (`TimerDrive::Manual` + `advance_timers`).

pub mod chirps;
pub mod driver;
pub mod timer;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audio::diagnostics::{AudioDiagnostics, DiagnosticsSnapshot};
use crate::audio::noise::BrownNoise;
use crate::audio::{AudioContext, ContextState};
use crate::config::AmbienceConfig;
use crate::error::Result;
use crate::ipc::events::{EngineStatus, EngineStatusEvent};
use chirps::ChirpScheduler;
use driver::TimerThread;

/// Status events buffered for slow subscribers.
const BROADCAST_CAP: usize = 64;

/// Offset between the noise seed and the chirp seed when `seed` is fixed.
const CHIRP_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// Who advances chirp timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDrive {
    /// A background thread fires timers on the wall clock.
    #[default]
    Thread,
    /// The caller fires timers through `advance_timers` (simulated time).
    Manual,
}

pub struct AmbientAudioEngine {
    config: AmbienceConfig,
    /// `None` when no audio is available: the engine stays inert.
    context: Option<AudioContext>,
    scheduler: Arc<Mutex<ChirpScheduler>>,
    /// Checked by the scheduler at every re-arm.
    stop: Arc<AtomicBool>,
    drive: TimerDrive,
    timer_thread: Option<TimerThread>,
    /// Origin for `TimerDrive::Thread` deadlines.
    origin: Instant,
    /// Simulated time for `TimerDrive::Manual`.
    manual_now: Duration,
    gesture_consumed: bool,
    status: EngineStatus,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    diagnostics: Arc<AudioDiagnostics>,
}

impl AmbientAudioEngine {
    /// Create an engine around `context`. Nothing plays until `start` or
    /// `notify_user_gesture` activates it.
    ///
    /// # Errors
    /// `ElytraError::InvalidAmbience` when the chirp ranges are empty.
    pub fn new(
        config: AmbienceConfig,
        context: Option<AudioContext>,
        drive: TimerDrive,
    ) -> Result<Self> {
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let diagnostics = context
            .as_ref()
            .map(|ctx| Arc::clone(ctx.graph().diagnostics()))
            .unwrap_or_default();
        let stop = Arc::new(AtomicBool::new(false));

        let chirp_rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(CHIRP_SEED_OFFSET)),
            None => StdRng::from_entropy(),
        };
        let scheduler = Arc::new(Mutex::new(ChirpScheduler::new(
            &config,
            chirp_rng,
            Arc::clone(&stop),
            Arc::clone(&diagnostics),
        )?));

        if context.is_none() {
            info!("no audio context, ambience disabled");
        }

        Ok(Self {
            config,
            context,
            scheduler,
            stop,
            drive,
            timer_thread: None,
            origin: Instant::now(),
            manual_now: Duration::ZERO,
            gesture_consumed: false,
            status: EngineStatus::Uninitialized,
            status_tx,
            diagnostics,
        })
    }

    /// Mount: activate immediately unless the context is suspended, in which
    /// case activation waits for the first user gesture.
    pub fn start(&mut self) {
        match self.context.as_ref().map(AudioContext::state) {
            Some(ContextState::Running) => self.activate(),
            Some(ContextState::Suspended) => {
                info!("audio context suspended, waiting for a user gesture");
            }
            Some(ContextState::Closed) | None => {}
        }
    }

    /// The user interacted. Only the first call has any effect.
    pub fn notify_user_gesture(&mut self) {
        if self.gesture_consumed {
            return;
        }
        self.gesture_consumed = true;
        self.activate();
    }

    pub fn gesture_consumed(&self) -> bool {
        self.gesture_consumed
    }

    /// Resume the context, then start noise and chirps if not already
    /// running. A second call while active does nothing.
    pub fn activate(&mut self) {
        if self.status != EngineStatus::Uninitialized {
            return;
        }
        let now = self.now();
        let Some(context) = self.context.as_mut() else {
            return;
        };

        if context.is_suspended() {
            if let Err(e) = context.resume() {
                warn!("audio context could not be resumed, ambience stays silent: {e}");
                return;
            }
        }
        if context.state() != ContextState::Running {
            warn!(state = ?context.state(), "audio context unusable, ambience stays silent");
            return;
        }

        let noise_rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        context
            .graph()
            .connect_noise(BrownNoise::new(&self.config, noise_rng));

        self.scheduler.lock().start(now);

        if self.drive == TimerDrive::Thread && self.timer_thread.is_none() {
            match TimerThread::spawn(
                Arc::clone(&self.scheduler),
                context.graph().clone(),
                self.origin,
            ) {
                Ok(thread) => self.timer_thread = Some(thread),
                Err(e) => warn!("chirp timer unavailable, noise only: {e}"),
            }
        }
        if let Some(thread) = &self.timer_thread {
            thread.wake();
        }

        info!(
            backend = context.backend_name(),
            sample_rate = context.sample_rate(),
            "ambience active"
        );
        self.set_status(EngineStatus::Active, None);
    }

    /// Advance simulated time to `now` and dispatch the chirp if one came
    /// due. Returns how many chirps were dispatched (zero or one). Only meaningful with
    /// `TimerDrive::Manual`.
    pub fn advance_timers(&mut self, now: Duration) -> usize {
        if self.drive != TimerDrive::Manual {
            return 0;
        }
        self.manual_now = self.manual_now.max(now);
        let Some(context) = self.context.as_ref() else {
            return 0;
        };
        let event = self
            .scheduler
            .lock()
            .poll(self.manual_now, context.current_time());
        match event {
            Some(event) => {
                context.graph().start_chirp(event);
                1
            }
            None => 0,
        }
    }

    /// Release everything, in order. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.status == EngineStatus::Stopped {
            return;
        }

        self.stop.store(true, Ordering::Release);

        let cancelled = self.scheduler.lock().cancel_all();
        if let Some(mut thread) = self.timer_thread.take() {
            thread.shutdown();
        }

        if let Some(context) = self.context.as_mut() {
            let graph = context.graph();
            if self.status == EngineStatus::Active {
                graph.disconnect_noise();
            }
            graph.disconnect_master();
            if let Err(e) = context.close() {
                warn!("audio context close reported an error: {e}");
            }
        }

        info!(cancelled_timers = cancelled, "ambience torn down");
        self.set_status(EngineStatus::Stopped, None);
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Outstanding chirp timers (the pending set).
    pub fn pending_timers(&self) -> usize {
        self.scheduler.lock().pending_len()
    }

    pub fn chirps_running(&self) -> bool {
        self.scheduler.lock().is_running()
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn timer_drive(&self) -> TimerDrive {
        self.drive
    }

    fn now(&self) -> Duration {
        match self.drive {
            TimerDrive::Thread => self.origin.elapsed(),
            TimerDrive::Manual => self.manual_now,
        }
    }

    fn set_status(&mut self, status: EngineStatus, detail: Option<String>) {
        self.status = status;
        let _ = self.status_tx.send(EngineStatusEvent { status, detail });
    }
}

impl Drop for AmbientAudioEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::{OfflineBackend, OfflineRenderer};

    fn manual_engine(initial: ContextState) -> (AmbientAudioEngine, OfflineRenderer) {
        let config = AmbienceConfig::seeded(21);
        let (context, renderer) = OfflineBackend::open(&config, 8_000, initial);
        (
            AmbientAudioEngine::new(config, Some(context), TimerDrive::Manual).expect("engine"),
            renderer,
        )
    }

    #[test]
    fn running_context_activates_on_start() {
        let (mut engine, mut renderer) = manual_engine(ContextState::Running);
        engine.start();
        assert_eq!(engine.status(), EngineStatus::Active);
        assert_eq!(engine.pending_timers(), 1);

        let block = renderer.render_frames(800);
        assert!(block.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn suspended_context_waits_for_gesture() {
        let (mut engine, _renderer) = manual_engine(ContextState::Suspended);
        engine.start();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert_eq!(engine.pending_timers(), 0);

        engine.notify_user_gesture();
        assert_eq!(engine.status(), EngineStatus::Active);
        assert_eq!(
            engine.context().map(AudioContext::state),
            Some(ContextState::Running)
        );
    }

    #[test]
    fn double_activation_creates_one_noise_node_and_one_timer() {
        let (mut engine, mut renderer) = manual_engine(ContextState::Running);
        engine.start();
        engine.activate();
        engine.notify_user_gesture();
        engine.notify_user_gesture();

        renderer.render_frames(256);
        let snap = engine.diagnostics_snapshot();
        assert_eq!(snap.noise_nodes_created, 1);
        assert_eq!(snap.chirps_scheduled, 1);
        assert_eq!(engine.pending_timers(), 1);
        assert!(engine.chirps_running());
    }

    #[test]
    fn gesture_is_consumed_once() {
        let (mut engine, _renderer) = manual_engine(ContextState::Suspended);
        engine.notify_user_gesture();
        assert!(engine.gesture_consumed());
        engine.teardown();
        engine.notify_user_gesture();
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn engine_without_context_is_inert() {
        let mut engine =
            AmbientAudioEngine::new(AmbienceConfig::seeded(1), None, TimerDrive::Manual)
                .expect("engine");
        engine.start();
        engine.notify_user_gesture();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert_eq!(engine.advance_timers(Duration::from_secs(60)), 0);
        engine.teardown();
        assert_eq!(engine.status(), EngineStatus::Stopped);
    }

    #[test]
    fn locked_context_leaves_engine_uninitialized() {
        let config = AmbienceConfig::seeded(2);
        let (context, mut renderer) = OfflineBackend::open_locked(&config, 8_000);
        let mut engine =
            AmbientAudioEngine::new(config, Some(context), TimerDrive::Manual).expect("engine");

        engine.notify_user_gesture();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert_eq!(engine.pending_timers(), 0);
        assert!(renderer.render_frames(256).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn manual_timers_dispatch_chirps() {
        let (mut engine, mut renderer) = manual_engine(ContextState::Running);
        engine.start();

        let mut dispatched = 0;
        for step in 1..=200u64 {
            renderer.render_frames(400);
            dispatched += engine.advance_timers(Duration::from_millis(step * 50));
        }
        // Ten simulated seconds hold between two and five chirps.
        assert!((2..=5).contains(&dispatched), "{dispatched}");
        assert_eq!(engine.pending_timers(), 1);
    }

    #[test]
    fn stalled_timers_release_a_single_chirp() {
        let (mut engine, mut renderer) = manual_engine(ContextState::Running);
        engine.start();
        renderer.render_frames(8_000 * 40);

        assert_eq!(engine.advance_timers(Duration::from_secs(40)), 1);
        assert_eq!(engine.advance_timers(Duration::from_secs(40)), 0);
        renderer.render_frames(8_000);

        let snap = engine.diagnostics_snapshot();
        assert_eq!(snap.chirps_dispatched, 1);
        assert_eq!(snap.chirps_started, 1);
        assert_eq!(snap.voices_dropped, 0);
    }

    #[test]
    fn teardown_is_ordered_and_idempotent() {
        let (mut engine, mut renderer) = manual_engine(ContextState::Running);
        let mut status_rx = engine.subscribe_status();
        engine.start();
        renderer.render_frames(256);

        engine.teardown();
        assert_eq!(engine.status(), EngineStatus::Stopped);
        assert_eq!(engine.pending_timers(), 0);
        assert!(!engine.chirps_running());
        assert_eq!(renderer.state(), ContextState::Closed);
        assert!(renderer.render_frames(256).iter().all(|&s| s == 0.0));

        engine.teardown();
        assert_eq!(engine.advance_timers(Duration::from_secs(600)), 0);

        assert_eq!(status_rx.try_recv().map(|e| e.status), Ok(EngineStatus::Active));
        assert_eq!(status_rx.try_recv().map(|e| e.status), Ok(EngineStatus::Stopped));
        assert!(status_rx.try_recv().is_err());
    }
}
