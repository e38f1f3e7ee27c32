//! Device-less context: the caller pulls blocks from an `OfflineRenderer`.
//!
//! Used for simulated-time tests and for rendering the ambience to a file.
//! Time only advances while the context is running, mirroring a suspended
//! device that delivers no callbacks.

use std::sync::Arc;

use crate::audio::diagnostics::AudioDiagnostics;
use crate::audio::graph::{self, RenderGraph, DEFAULT_MAX_BLOCK_FRAMES};
use crate::audio::{AudioContext, ContextBackend, ContextState, SharedContextState};
use crate::config::AmbienceConfig;
use crate::error::{ElytraError, Result};

pub struct OfflineBackend {
    refuse_resume: bool,
}

impl OfflineBackend {
    /// Open an offline context in `initial` state.
    pub fn open(
        config: &AmbienceConfig,
        sample_rate: u32,
        initial: ContextState,
    ) -> (AudioContext, OfflineRenderer) {
        Self::open_with(config, sample_rate, initial, false)
    }

    /// A suspended context whose `resume` always fails, like a platform
    /// that keeps audio locked.
    pub fn open_locked(config: &AmbienceConfig, sample_rate: u32) -> (AudioContext, OfflineRenderer) {
        Self::open_with(config, sample_rate, ContextState::Suspended, true)
    }

    fn open_with(
        config: &AmbienceConfig,
        sample_rate: u32,
        initial: ContextState,
        refuse_resume: bool,
    ) -> (AudioContext, OfflineRenderer) {
        let diagnostics = Arc::new(AudioDiagnostics::default());
        let (handle, graph) =
            graph::build(config, sample_rate, DEFAULT_MAX_BLOCK_FRAMES, diagnostics);
        let state = Arc::new(SharedContextState::new(initial));

        let context = AudioContext::new(
            Box::new(OfflineBackend { refuse_resume }),
            Arc::clone(&state),
            handle,
        );
        let renderer = OfflineRenderer { graph, state };
        (context, renderer)
    }
}

impl ContextBackend for OfflineBackend {
    fn resume(&mut self) -> Result<()> {
        if self.refuse_resume {
            return Err(ElytraError::AudioStream(
                "offline context is locked".into(),
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Render side of an offline context.
pub struct OfflineRenderer {
    graph: RenderGraph,
    state: Arc<SharedContextState>,
}

impl OfflineRenderer {
    /// Render one interleaved block. Returns `false` (and writes silence)
    /// unless the context is running.
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> bool {
        if self.state.load() != ContextState::Running {
            out.fill(0.0);
            return false;
        }
        self.graph.render(out, channels);
        true
    }

    /// Render `frames` mono frames into a fresh buffer.
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out, 1);
        out
    }

    pub fn state(&self) -> ContextState {
        self.state.load()
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph.sample_rate()
    }

    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }
}
