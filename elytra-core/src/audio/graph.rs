//! The ambient render graph and its control handle.
//!
//! ```text
//!   BrownNoise ──┐
//!                ├──► Σ ──► × master_gain ──► interleaved device buffer
//!   VoicePool ───┘
//! ```
//!
//! `RenderGraph` is owned by whatever renders audio (the cpal callback or an
//! offline renderer). It never blocks and never allocates: commands arrive
//! through a lock-free ring, scratch space and voice slots are sized at
//! construction, and long device buffers are processed in scratch-sized
//! pieces.
//!
//! `GraphHandle` is the cloneable control side used by the engine and the
//! chirp timer thread.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::warn;

use crate::audio::chirp::{ChirpEnvelope, ChirpEvent, VoicePool};
use crate::audio::diagnostics::AudioDiagnostics;
use crate::audio::noise::BrownNoise;
use crate::buffering::{
    create_command_ring, CommandConsumer, CommandProducer, Consumer, Producer,
};
use crate::config::AmbienceConfig;

/// Scratch length used when the host does not announce a block size.
pub const DEFAULT_MAX_BLOCK_FRAMES: usize = 4096;

/// Structural changes sent from the control side to the render graph.
pub enum GraphCommand {
    /// Attach the noise node. Ignored if one is already attached.
    ConnectNoise(BrownNoise),
    /// Detach and drop the noise node.
    DisconnectNoise,
    /// Start a chirp voice at `event.start_time`.
    StartChirp(ChirpEvent),
}

/// State both sides observe without locking.
struct GraphShared {
    sample_rate: u32,
    frames_rendered: AtomicU64,
    master_connected: AtomicBool,
    noise_live: AtomicBool,
}

/// Control-side handle to a render graph.
#[derive(Clone)]
pub struct GraphHandle {
    commands: Arc<Mutex<CommandProducer>>,
    shared: Arc<GraphShared>,
    diagnostics: Arc<AudioDiagnostics>,
}

impl GraphHandle {
    /// Queue a command for the next render block.
    ///
    /// Returns `false` when the ring is full (the render side has stalled);
    /// the command is dropped and counted.
    pub fn send(&self, command: GraphCommand) -> bool {
        match self.commands.lock().try_push(command) {
            Ok(()) => true,
            Err(_) => {
                AudioDiagnostics::incr(&self.diagnostics.commands_dropped);
                warn!("render graph command ring full, command dropped");
                false
            }
        }
    }

    pub fn connect_noise(&self, noise: BrownNoise) -> bool {
        self.send(GraphCommand::ConnectNoise(noise))
    }

    pub fn disconnect_noise(&self) -> bool {
        self.send(GraphCommand::DisconnectNoise)
    }

    pub fn start_chirp(&self, event: ChirpEvent) -> bool {
        self.send(GraphCommand::StartChirp(event))
    }

    /// Silence the output stage. Takes effect on the next block.
    pub fn disconnect_master(&self) {
        self.shared.master_connected.store(false, Ordering::Release);
    }

    pub fn is_master_connected(&self) -> bool {
        self.shared.master_connected.load(Ordering::Acquire)
    }

    /// Whether the render side currently has a noise node attached.
    pub fn is_noise_live(&self) -> bool {
        self.shared.noise_live.load(Ordering::Acquire)
    }

    /// Audio-context time in seconds: frames rendered so far / sample rate.
    pub fn current_time(&self) -> f64 {
        self.shared.frames_rendered.load(Ordering::Acquire) as f64
            / self.shared.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn diagnostics(&self) -> &Arc<AudioDiagnostics> {
        &self.diagnostics
    }
}

/// Render side of the graph.
pub struct RenderGraph {
    commands: CommandConsumer,
    shared: Arc<GraphShared>,
    diagnostics: Arc<AudioDiagnostics>,
    noise: Option<BrownNoise>,
    voices: VoicePool,
    master_gain: f32,
    scratch: Vec<f32>,
}

impl RenderGraph {
    /// Render into an interleaved `f32` buffer with `channels` channels.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.render_interleaved(out, channels, |s| s);
    }

    /// Render into any interleaved sample type; `convert` maps `[-1, 1]`
    /// floats to the device format. Every channel carries the same signal.
    pub fn render_interleaved<T: Copy>(
        &mut self,
        out: &mut [T],
        channels: usize,
        convert: impl Fn(f32) -> T,
    ) {
        let channels = channels.max(1);
        self.apply_commands();

        let frames = out.len() / channels;
        let (body, tail) = out.split_at_mut(frames * channels);
        tail.fill(convert(0.0));

        let sample_rate = self.shared.sample_rate as f64;
        let gain = if self.shared.master_connected.load(Ordering::Acquire) {
            self.master_gain
        } else {
            0.0
        };
        let mut frame_cursor = self.shared.frames_rendered.load(Ordering::Relaxed);

        for piece in body.chunks_mut(self.scratch.len() * channels) {
            let n = piece.len() / channels;
            let mono = &mut self.scratch[..n];

            match self.noise.as_mut() {
                Some(noise) => noise.fill(mono),
                None => mono.fill(0.0),
            }

            let block_start = frame_cursor as f64 / sample_rate;
            let finished = self.voices.render_add(mono, block_start, sample_rate);
            if finished > 0 {
                AudioDiagnostics::add(&self.diagnostics.chirps_finished, finished);
            }

            for (frame, &sample) in piece.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(convert(sample * gain));
            }
            frame_cursor += n as u64;
        }

        self.shared
            .frames_rendered
            .store(frame_cursor, Ordering::Release);
        AudioDiagnostics::incr(&self.diagnostics.blocks_rendered);
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                GraphCommand::ConnectNoise(noise) => {
                    if self.noise.is_none() {
                        self.noise = Some(noise);
                        self.shared.noise_live.store(true, Ordering::Release);
                        AudioDiagnostics::incr(&self.diagnostics.noise_nodes_created);
                    }
                }
                GraphCommand::DisconnectNoise => {
                    if self.noise.take().is_some() {
                        self.shared.noise_live.store(false, Ordering::Release);
                        AudioDiagnostics::incr(&self.diagnostics.noise_nodes_released);
                    }
                }
                GraphCommand::StartChirp(event) => {
                    if self.voices.spawn(event) {
                        AudioDiagnostics::incr(&self.diagnostics.chirps_started);
                    } else {
                        AudioDiagnostics::incr(&self.diagnostics.voices_dropped);
                    }
                }
            }
        }
    }

    pub fn has_noise(&self) -> bool {
        self.noise.is_some()
    }

    pub fn live_voices(&self) -> usize {
        self.voices.live()
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }
}

/// Build a connected control handle / render graph pair.
///
/// `max_block_frames` sizes the mono scratch buffer; larger device buffers
/// are still rendered, just in several passes.
pub fn build(
    config: &AmbienceConfig,
    sample_rate: u32,
    max_block_frames: usize,
    diagnostics: Arc<AudioDiagnostics>,
) -> (GraphHandle, RenderGraph) {
    let (producer, consumer) = create_command_ring();
    let shared = Arc::new(GraphShared {
        sample_rate: sample_rate.max(1),
        frames_rendered: AtomicU64::new(0),
        master_connected: AtomicBool::new(true),
        noise_live: AtomicBool::new(false),
    });

    let handle = GraphHandle {
        commands: Arc::new(Mutex::new(producer)),
        shared: Arc::clone(&shared),
        diagnostics: Arc::clone(&diagnostics),
    };

    let graph = RenderGraph {
        commands: consumer,
        shared,
        diagnostics,
        noise: None,
        voices: VoicePool::new(config.voice_capacity, ChirpEnvelope::from_config(config)),
        master_gain: config.master_gain,
        scratch: vec![0.0; max_block_frames.max(1)],
    };

    (handle, graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn graph_pair(max_block: usize) -> (GraphHandle, RenderGraph) {
        build(
            &AmbienceConfig::seeded(1),
            48_000,
            max_block,
            Arc::new(AudioDiagnostics::default()),
        )
    }

    #[test]
    fn empty_graph_renders_silence_and_advances_time() {
        let (handle, mut graph) = graph_pair(256);
        let mut out = vec![1.0f32; 960];
        graph.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_abs_diff_eq!(handle.current_time(), 480.0 / 48_000.0, epsilon = 1e-12);
    }

    #[test]
    fn noise_is_scaled_by_master_gain_and_duplicated_across_channels() {
        let config = AmbienceConfig::seeded(1);
        let (handle, mut graph) = graph_pair(4096);
        assert!(handle.connect_noise(BrownNoise::seeded(&config, 5)));

        let mut out = vec![0f32; 2 * 4096];
        graph.render(&mut out, 2);
        assert!(graph.has_noise());
        assert!(handle.is_noise_live());

        let mut reference = BrownNoise::seeded(&config, 5);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
            let expected = reference.next_sample() * config.master_gain;
            assert_abs_diff_eq!(frame[0], expected, epsilon = 1e-7);
        }
    }

    #[test]
    fn second_noise_connection_is_ignored() {
        let config = AmbienceConfig::seeded(1);
        let (handle, mut graph) = graph_pair(128);
        handle.connect_noise(BrownNoise::seeded(&config, 1));
        handle.connect_noise(BrownNoise::seeded(&config, 2));
        let mut out = vec![0f32; 128];
        graph.render(&mut out, 1);
        assert_eq!(handle.diagnostics().snapshot().noise_nodes_created, 1);

        handle.disconnect_noise();
        graph.render(&mut out, 1);
        assert!(!graph.has_noise());
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(handle.diagnostics().snapshot().noise_nodes_released, 1);
    }

    #[test]
    fn long_buffers_are_rendered_in_pieces() {
        let config = AmbienceConfig::seeded(1);
        let (handle, mut graph) = graph_pair(100);
        handle.connect_noise(BrownNoise::seeded(&config, 9));
        let mut out = vec![0f32; 1_001];
        graph.render(&mut out, 1);

        let mut reference = BrownNoise::seeded(&config, 9);
        for &s in &out {
            assert_abs_diff_eq!(s, reference.next_sample() * config.master_gain, epsilon = 1e-7);
        }
        assert_abs_diff_eq!(handle.current_time(), 1_001.0 / 48_000.0, epsilon = 1e-12);
    }

    #[test]
    fn chirp_plays_and_retires() {
        let (handle, mut graph) = graph_pair(4096);
        handle.start_chirp(ChirpEvent {
            start_frequency: 1200.0,
            end_frequency: 600.0,
            start_time: 0.0,
        });

        let mut out = vec![0f32; 4096];
        graph.render(&mut out, 1);
        assert_eq!(graph.live_voices(), 1);
        assert!(out.iter().any(|&s| s != 0.0));

        // 0.4 s at 48 kHz is 19 200 frames.
        for _ in 0..5 {
            graph.render(&mut out, 1);
        }
        assert_eq!(graph.live_voices(), 0);
        let snap = handle.diagnostics().snapshot();
        assert_eq!(snap.chirps_started, 1);
        assert_eq!(snap.chirps_finished, 1);
    }

    #[test]
    fn disconnected_master_silences_output() {
        let config = AmbienceConfig::seeded(1);
        let (handle, mut graph) = graph_pair(512);
        handle.connect_noise(BrownNoise::seeded(&config, 3));
        handle.disconnect_master();
        assert!(!handle.is_master_connected());

        let mut out = vec![0.5f32; 1024];
        graph.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn ragged_tail_is_zero_filled() {
        let (_handle, mut graph) = graph_pair(64);
        let mut out = vec![7i16; 9];
        graph.render_interleaved(&mut out, 2, |s| (s * i16::MAX as f32) as i16);
        assert!(out.iter().all(|&s| s == 0));
    }
}
