//! # elytra-core
//!
//! Timing and procedural-audio engine for a looping captioned presentation.
//!
//! ## Architecture
//!
//! ```text
//! visual tick domain                      audio domains
//! ──────────────────                      ─────────────
//! FrameSource → AnimationLoop             AmbientAudioEngine
//!                 │                          │  start / gesture / teardown
//!            LoopClock::tick                 ├─► ChirpScheduler (timer thread or manual drive)
//!                 │                          │        │ ChirpEvent
//!       CaptionScheduler::frame              │        ▼
//!                 │                          └─► GraphHandle ──ringbuf──► RenderGraph
//!            CaptionFrame                                                 noise + voices × gain
//!                                                                         (cpal callback / offline)
//! ```
//!
//! The two sides share nothing. The render callback is zero-alloc and
//! lock-free; all structural work happens on the control side.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod timing;

// Convenience re-exports for downstream crates
pub use audio::offline::{OfflineBackend, OfflineRenderer};
pub use audio::{AudioContext, ContextState};
pub use config::{AmbienceConfig, PresentationConfig, Segment};
pub use engine::{AmbientAudioEngine, TimerDrive};
pub use error::ElytraError;
pub use ipc::events::{CaptionFrame, CaptionState, EngineStatus, EngineStatusEvent};
pub use timing::{
    AnimationLoop, CaptionScheduler, FrameSource, LoopClock, LoopTime, ManualFrameSource,
    PacedFrameSource,
};
