//! Bird-chirp voices: a sine sweep under a short attack/decay envelope.
//!
//! ## Envelope (seconds from event start)
//!
//! ```text
//! frequency  f0 ──exp──► f1 over [0, 0.35], then held
//! gain       0 ──lin──► 0.03 over [0, 0.04]
//!            0.03 ──exp──► 0.0001 over [0.04, 0.4]
//! stop       0.4, the voice slot is released
//! ```
//!
//! Voices live in a `VoicePool` whose slots are allocated once when the
//! render graph is built, so spawning and retiring chirps never touches the
//! allocator on the render thread.

use std::f64::consts::TAU;

use serde::Serialize;

use crate::config::AmbienceConfig;

/// One scheduled chirp. `start_time` is in audio-context seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChirpEvent {
    pub start_frequency: f64,
    pub end_frequency: f64,
    pub start_time: f64,
}

/// Frequency and gain automation shared by every chirp.
#[derive(Debug, Clone, Copy)]
pub struct ChirpEnvelope {
    pub sweep_secs: f64,
    pub attack_secs: f64,
    pub total_secs: f64,
    pub peak_gain: f32,
    pub floor_gain: f32,
}

impl ChirpEnvelope {
    pub fn from_config(config: &AmbienceConfig) -> Self {
        Self {
            sweep_secs: config.chirp_sweep_secs,
            attack_secs: config.chirp_attack_secs,
            total_secs: config.chirp_total_secs,
            peak_gain: config.chirp_peak_gain,
            floor_gain: config.chirp_floor_gain,
        }
    }

    /// Oscillator frequency `t` seconds into the event.
    pub fn frequency_at(&self, event: &ChirpEvent, t: f64) -> f64 {
        if t <= 0.0 {
            event.start_frequency
        } else if t < self.sweep_secs {
            let ratio = event.end_frequency / event.start_frequency;
            event.start_frequency * ratio.powf(t / self.sweep_secs)
        } else {
            event.end_frequency
        }
    }

    /// Amplitude `t` seconds into the event; zero before start and after stop.
    pub fn gain_at(&self, t: f64) -> f32 {
        if t < 0.0 || t >= self.total_secs {
            0.0
        } else if t < self.attack_secs {
            self.peak_gain * (t / self.attack_secs) as f32
        } else {
            let progress = (t - self.attack_secs) / (self.total_secs - self.attack_secs);
            let ratio = (self.floor_gain / self.peak_gain) as f64;
            self.peak_gain * ratio.powf(progress) as f32
        }
    }
}

/// A live chirp: oscillator phase plus the event that drives it.
#[derive(Debug, Clone, Copy)]
pub struct ChirpVoice {
    event: ChirpEvent,
    phase: f64,
}

impl ChirpVoice {
    pub fn new(event: ChirpEvent) -> Self {
        Self { event, phase: 0.0 }
    }

    /// Mix this voice into `out`, whose first sample sits at context time
    /// `block_start`. Returns `true` once the oscillator has stopped.
    pub fn render_add(
        &mut self,
        out: &mut [f32],
        block_start: f64,
        sample_rate: f64,
        envelope: &ChirpEnvelope,
    ) -> bool {
        let dt = 1.0 / sample_rate;
        for (i, sample) in out.iter_mut().enumerate() {
            let t = block_start + i as f64 * dt - self.event.start_time;
            if t < 0.0 {
                continue;
            }
            if t >= envelope.total_secs {
                return true;
            }
            let gain = envelope.gain_at(t);
            *sample += self.phase.sin() as f32 * gain;
            let freq = envelope.frequency_at(&self.event, t);
            self.phase = (self.phase + TAU * freq * dt) % TAU;
        }
        block_start + out.len() as f64 * dt - self.event.start_time >= envelope.total_secs
    }
}

/// Fixed-capacity arena of chirp voices.
pub struct VoicePool {
    slots: Vec<Option<ChirpVoice>>,
    envelope: ChirpEnvelope,
}

impl VoicePool {
    /// Allocates every slot up front.
    pub fn new(capacity: usize, envelope: ChirpEnvelope) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            envelope,
        }
    }

    /// Claim a free slot. Returns `false` (chirp dropped) when all are busy.
    pub fn spawn(&mut self, event: ChirpEvent) -> bool {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(ChirpVoice::new(event));
                true
            }
            None => false,
        }
    }

    /// Mix all live voices into `out`; returns how many finished this block.
    pub fn render_add(&mut self, out: &mut [f32], block_start: f64, sample_rate: f64) -> usize {
        let mut finished = 0;
        for slot in self.slots.iter_mut() {
            if let Some(voice) = slot {
                if voice.render_add(out, block_start, sample_rate, &self.envelope) {
                    *slot = None;
                    finished += 1;
                }
            }
        }
        finished
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
