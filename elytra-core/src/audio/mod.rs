//! Audio render domain: contexts, the ambient graph and its building blocks.
//!
//! # Design constraints
//!
//! The render callback runs on an OS audio thread at elevated priority. It
//! **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! `graph::RenderGraph` satisfies that contract; everything structural (new
//! noise node, new chirp) is prepared on the control side and handed over
//! through a lock-free ring.
//!
//! # Contexts
//!
//! An `AudioContext` pairs a `GraphHandle` with a backend that owns the
//! render side:
//!
//! | Backend | Render side | `resume` | `close` |
//! |---------|-------------|----------|---------|
//! | `output::CpalBackend` | cpal output callback | `stream.play()` | drop the stream |
//! | `offline::OfflineBackend` | `OfflineRenderer`, pulled by the caller | flip state | flip state |
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms, so a cpal-backed
//! `AudioContext` must be created and dropped on the same thread.

pub mod chirp;
pub mod device;
pub mod diagnostics;
pub mod graph;
pub mod noise;
pub mod offline;
#[cfg(feature = "audio-cpal")]
pub mod output;

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use serde::Serialize;
use tracing::debug;

use crate::error::{ElytraError, Result};
use graph::GraphHandle;

/// Lifecycle of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Created but not producing audio (autoplay policy, or not yet resumed).
    Suspended,
    Running,
    /// Released. Terminal.
    Closed,
}

impl ContextState {
    fn as_u8(self) -> u8 {
        match self {
            ContextState::Suspended => 0,
            ContextState::Running => 1,
            ContextState::Closed => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ContextState::Suspended,
            1 => ContextState::Running,
            _ => ContextState::Closed,
        }
    }
}

/// Context state readable from the render side without locking.
#[derive(Debug)]
pub struct SharedContextState(AtomicU8);

impl SharedContextState {
    pub fn new(state: ContextState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> ContextState {
        ContextState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ContextState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Platform half of an audio context.
pub trait ContextBackend {
    /// Start (or restart) delivering audio.
    fn resume(&mut self) -> Result<()>;

    /// Stop delivering audio and release the device. Called at most once.
    fn close(&mut self) -> Result<()>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// A running (or suspended) audio graph plus the platform that renders it.
pub struct AudioContext {
    backend: Box<dyn ContextBackend>,
    state: Arc<SharedContextState>,
    graph: GraphHandle,
}

impl AudioContext {
    pub fn new(
        backend: Box<dyn ContextBackend>,
        state: Arc<SharedContextState>,
        graph: GraphHandle,
    ) -> Self {
        Self {
            backend,
            state,
            graph,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state.load()
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == ContextState::Suspended
    }

    /// Resume a suspended context. No-op while running.
    ///
    /// # Errors
    /// `ElytraError::ContextClosed` after `close`, or the backend's error.
    pub fn resume(&mut self) -> Result<()> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(ElytraError::ContextClosed),
            ContextState::Suspended => {
                self.backend.resume()?;
                self.state.store(ContextState::Running);
                debug!(backend = self.backend.name(), "audio context resumed");
                Ok(())
            }
        }
    }

    /// Close the context. No-op once closed.
    ///
    /// The state is `Closed` afterwards even if the backend reports an error.
    pub fn close(&mut self) -> Result<()> {
        if self.state() == ContextState::Closed {
            return Ok(());
        }
        self.state.store(ContextState::Closed);
        let result = self.backend.close();
        debug!(backend = self.backend.name(), "audio context closed");
        result
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

/// Open the platform output device, or the preferred one by name.
///
/// # Errors
/// `ElytraError::AudioUnavailable` when built without the `audio-cpal`
/// feature; device and stream errors otherwise.
#[cfg(feature = "audio-cpal")]
pub fn open_output(
    config: &crate::config::AmbienceConfig,
    preferred_device_name: Option<&str>,
    autoplay: bool,
) -> Result<AudioContext> {
    output::open(config, preferred_device_name, autoplay)
}

#[cfg(not(feature = "audio-cpal"))]
pub fn open_output(
    _config: &crate::config::AmbienceConfig,
    _preferred_device_name: Option<&str>,
    _autoplay: bool,
) -> Result<AudioContext> {
    Err(ElytraError::AudioUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmbienceConfig;

    #[test]
    fn shared_state_round_trips() {
        let state = SharedContextState::new(ContextState::Suspended);
        assert_eq!(state.load(), ContextState::Suspended);
        state.store(ContextState::Running);
        assert_eq!(state.load(), ContextState::Running);
        state.store(ContextState::Closed);
        assert_eq!(state.load(), ContextState::Closed);
    }

    #[test]
    fn context_transitions() {
        let (mut ctx, _renderer) =
            offline::OfflineBackend::open(&AmbienceConfig::default(), 8_000, ContextState::Suspended);
        assert!(ctx.is_suspended());
        ctx.resume().expect("resume suspended context");
        assert_eq!(ctx.state(), ContextState::Running);
        ctx.resume().expect("resume is idempotent");

        ctx.close().expect("close");
        assert_eq!(ctx.state(), ContextState::Closed);
        ctx.close().expect("second close is a no-op");
        assert!(matches!(ctx.resume(), Err(ElytraError::ContextClosed)));
    }
}
