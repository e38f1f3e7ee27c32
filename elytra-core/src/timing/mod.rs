//! Visual tick domain: loop clock, caption fades and the frame-driven loop.
//!
//! ## Flow
//!
//! ```text
//! FrameSource ──request/deliver──► AnimationLoop::on_frame(now)
//!                                      │
//!                                 LoopClock::tick → LoopTime
//!                                      │
//!                              CaptionScheduler::frame → CaptionFrame
//! ```
//!
//! Frames are requested one at a time, the way a display-refresh callback is
//! armed. `AnimationLoop::stop` withdraws the outstanding request, after which
//! no frame is processed even if the host still delivers one.

pub mod captions;
pub mod clock;

pub use captions::CaptionScheduler;
pub use clock::{LoopClock, LoopTime};

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::debug;

use crate::config::PresentationConfig;
use crate::ipc::events::CaptionFrame;

/// Token for one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameRequest(u64);

impl FrameRequest {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// A frame-pacing source (display refresh, interval timer, test harness).
pub trait FrameSource {
    /// Arm the source to deliver one frame.
    fn request_frame(&mut self) -> FrameRequest;

    /// Withdraw a request that has not been delivered yet.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Single-slot source drained by a host pacer (e.g. a tokio interval).
///
/// The host calls `take_due` once per refresh and forwards the request, if
/// any, to `AnimationLoop::on_frame`.
#[derive(Debug, Default)]
pub struct PacedFrameSource {
    next_id: u64,
    pending: Option<FrameRequest>,
}

impl PacedFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the request to service on this refresh.
    pub fn take_due(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl FrameSource for PacedFrameSource {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

/// Records every request and cancellation; frames are delivered by hand.
#[derive(Debug, Default)]
pub struct ManualFrameSource {
    next_id: u64,
    outstanding: BTreeSet<FrameRequest>,
    cancelled: Vec<FrameRequest>,
}

impl ManualFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the oldest outstanding request.
    pub fn take_next(&mut self) -> Option<FrameRequest> {
        self.outstanding.pop_first()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn cancelled(&self) -> &[FrameRequest] {
        &self.cancelled
    }
}

impl FrameSource for ManualFrameSource {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.outstanding.insert(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.outstanding.remove(&request) {
            self.cancelled.push(request);
        }
    }
}

/// Drives `LoopClock` + `CaptionScheduler` from a `FrameSource`.
pub struct AnimationLoop<S: FrameSource> {
    clock: LoopClock,
    captions: CaptionScheduler,
    source: S,
    pending: Option<FrameRequest>,
    running: bool,
}

impl<S: FrameSource> AnimationLoop<S> {
    pub fn new(config: PresentationConfig, source: S) -> Self {
        Self {
            clock: LoopClock::new(config.loop_duration()),
            captions: CaptionScheduler::new(config),
            source,
            pending: None,
            running: false,
        }
    }

    /// Arm the first frame. No-op while already running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.pending = Some(self.source.request_frame());
        debug!("animation loop started");
    }

    /// Service a delivered frame.
    ///
    /// Returns `None` for stale or cancelled requests and after `stop`;
    /// otherwise computes the caption frame and arms the next request.
    pub fn on_frame(&mut self, request: FrameRequest, now: Instant) -> Option<CaptionFrame> {
        if !self.running || self.pending != Some(request) {
            return None;
        }

        let time = self.clock.tick(now);
        let frame = self.captions.frame(time);
        self.pending = Some(self.source.request_frame());
        Some(frame)
    }

    /// Withdraw the outstanding request; no frame is processed afterwards.
    pub fn stop(&mut self) {
        if let Some(request) = self.pending.take() {
            self.source.cancel_frame(request);
        }
        if self.running {
            debug!("animation loop stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn captions(&self) -> &CaptionScheduler {
        &self.captions
    }
}

impl<S: FrameSource> Drop for AnimationLoop<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
