//! Fixed presentation and ambience constants, gathered into immutable
//! configuration structures that are injected at construction.
//!
//! Nothing here is meant to be tuned at runtime: the structures exist so the
//! clock, caption scheduler and audio engine receive their tables explicitly
//! instead of reaching for globals.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ElytraError, Result};

/// Length of one presentation loop (seconds).
pub const LOOP_DURATION: f64 = 15.0;
/// Length of a caption fade-in or fade-out window (seconds).
pub const FADE_DURATION: f64 = 1.0;

/// Output level applied to everything the audio graph produces.
pub const MASTER_GAIN: f32 = 0.05;

/// One-pole leaky integrator: `last = (last + NOISE_INPUT_COEFF * white) / NOISE_LEAK_DIVISOR`.
pub const NOISE_INPUT_COEFF: f32 = 0.02;
pub const NOISE_LEAK_DIVISOR: f32 = 1.02;
/// Makeup gain applied to the integrator output.
pub const NOISE_OUTPUT_SCALE: f32 = 3.5;
/// Block size the noise node was designed around (frames).
pub const NOISE_BLOCK_FRAMES: usize = 4096;

/// Inter-chirp delay range, milliseconds, half-open.
pub const CHIRP_DELAY_MIN_MS: f64 = 2000.0;
pub const CHIRP_DELAY_MAX_MS: f64 = 5000.0;
/// Sweep start frequency: `CHIRP_START_BASE_HZ + U(0, CHIRP_START_SPREAD_HZ)`.
pub const CHIRP_START_BASE_HZ: f64 = 1000.0;
pub const CHIRP_START_SPREAD_HZ: f64 = 400.0;
/// Sweep end frequency: `CHIRP_END_BASE_HZ + U(0, CHIRP_END_SPREAD_HZ)`.
pub const CHIRP_END_BASE_HZ: f64 = 500.0;
pub const CHIRP_END_SPREAD_HZ: f64 = 200.0;
/// Envelope timings (seconds from event start).
pub const CHIRP_SWEEP_SECS: f64 = 0.35;
pub const CHIRP_ATTACK_SECS: f64 = 0.04;
pub const CHIRP_TOTAL_SECS: f64 = 0.4;
/// Envelope levels.
pub const CHIRP_PEAK_GAIN: f32 = 0.03;
pub const CHIRP_FLOOR_GAIN: f32 = 0.0001;

/// Simultaneous chirp voices the render graph can hold.
/// Chirps are at least 2 s apart and last 0.4 s, so one is normally enough.
pub const CHIRP_VOICE_CAPACITY: usize = 8;

/// A caption shown during `[start, end)` of the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub text: String,
    /// Seconds from loop start.
    pub start: f64,
    /// Seconds from loop start, exclusive.
    pub end: f64,
}

impl Segment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start,
            end,
        }
    }
}

/// The beetle captions shown when no table is supplied.
pub fn default_segments() -> Vec<Segment> {
    vec![
        Segment::new(
            "segment-1",
            "Beetles are insects with hard bodies called elytra.",
            0.0,
            5.0,
        ),
        Segment::new(
            "segment-2",
            "Elytra function to protect the wings underneath.",
            5.0,
            10.0,
        ),
        Segment::new(
            "segment-3",
            "There are over 350,000 species of beetles in the world!",
            10.0,
            15.0,
        ),
    ]
}

/// Visual-domain configuration: loop length, fade length and caption table.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationConfig {
    loop_duration: f64,
    fade_duration: f64,
    segments: Vec<Segment>,
}

impl PresentationConfig {
    /// Build a configuration with the fixed loop/fade constants.
    ///
    /// # Errors
    /// `ElytraError::EmptySegmentTable` for an empty table,
    /// `ElytraError::InvalidSegment` when a segment violates
    /// `0 ≤ start < end ≤ LOOP_DURATION` or reuses an id.
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        validate_segments(&segments, LOOP_DURATION)?;
        Ok(Self {
            loop_duration: LOOP_DURATION,
            fade_duration: FADE_DURATION,
            segments,
        })
    }

    pub fn loop_duration(&self) -> f64 {
        self.loop_duration
    }

    pub fn fade_duration(&self) -> f64 {
        self.fade_duration
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            loop_duration: LOOP_DURATION,
            fade_duration: FADE_DURATION,
            segments: default_segments(),
        }
    }
}

fn validate_segments(segments: &[Segment], loop_duration: f64) -> Result<()> {
    if segments.is_empty() {
        return Err(ElytraError::EmptySegmentTable);
    }

    let mut seen = HashSet::new();
    for segment in segments {
        let invalid = |reason: &str| ElytraError::InvalidSegment {
            id: segment.id.clone(),
            reason: reason.to_string(),
        };

        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if segment.start < 0.0 {
            return Err(invalid("start must not be negative"));
        }
        if segment.start >= segment.end {
            return Err(invalid("start must be before end"));
        }
        if segment.end > loop_duration {
            return Err(invalid("end must not exceed the loop duration"));
        }
        if !seen.insert(segment.id.as_str()) {
            return Err(invalid("duplicate id"));
        }
    }
    Ok(())
}

/// Audio-domain configuration for `AmbientAudioEngine`.
#[derive(Debug, Clone)]
pub struct AmbienceConfig {
    /// Write-once master gain.
    pub master_gain: f32,
    pub noise_input_coeff: f32,
    pub noise_leak_divisor: f32,
    pub noise_output_scale: f32,
    /// Half-open inter-chirp delay range.
    pub chirp_delay: (Duration, Duration),
    pub chirp_start_hz: (f64, f64),
    pub chirp_end_hz: (f64, f64),
    pub chirp_sweep_secs: f64,
    pub chirp_attack_secs: f64,
    pub chirp_total_secs: f64,
    pub chirp_peak_gain: f32,
    pub chirp_floor_gain: f32,
    pub voice_capacity: usize,
    /// Seed for the noise and chirp generators. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl AmbienceConfig {
    /// Same constants, reproducible randomness.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Check the ranges the chirp scheduler samples from.
    ///
    /// # Errors
    /// `ElytraError::InvalidAmbience` when the delay range is empty or starts
    /// at zero, or a frequency range is empty, non-finite or not positive.
    pub fn validate(&self) -> Result<()> {
        let (min_delay, max_delay) = self.chirp_delay;
        if min_delay.is_zero() {
            return Err(ElytraError::InvalidAmbience(
                "chirp delay must be positive".into(),
            ));
        }
        if min_delay >= max_delay {
            return Err(ElytraError::InvalidAmbience(format!(
                "chirp delay range {min_delay:?}..{max_delay:?} is empty"
            )));
        }
        validate_hz_range("chirp start", self.chirp_start_hz)?;
        validate_hz_range("chirp end", self.chirp_end_hz)
    }
}

fn validate_hz_range(what: &str, (low, high): (f64, f64)) -> Result<()> {
    if !low.is_finite() || !high.is_finite() || low <= 0.0 {
        return Err(ElytraError::InvalidAmbience(format!(
            "{what} frequencies must be finite and positive"
        )));
    }
    if low >= high {
        return Err(ElytraError::InvalidAmbience(format!(
            "{what} range {low}..{high} Hz is empty"
        )));
    }
    Ok(())
}

impl Default for AmbienceConfig {
    fn default() -> Self {
        Self {
            master_gain: MASTER_GAIN,
            noise_input_coeff: NOISE_INPUT_COEFF,
            noise_leak_divisor: NOISE_LEAK_DIVISOR,
            noise_output_scale: NOISE_OUTPUT_SCALE,
            chirp_delay: (
                Duration::from_secs_f64(CHIRP_DELAY_MIN_MS / 1000.0),
                Duration::from_secs_f64(CHIRP_DELAY_MAX_MS / 1000.0),
            ),
            chirp_start_hz: (CHIRP_START_BASE_HZ, CHIRP_START_BASE_HZ + CHIRP_START_SPREAD_HZ),
            chirp_end_hz: (CHIRP_END_BASE_HZ, CHIRP_END_BASE_HZ + CHIRP_END_SPREAD_HZ),
            chirp_sweep_secs: CHIRP_SWEEP_SECS,
            chirp_attack_secs: CHIRP_ATTACK_SECS,
            chirp_total_secs: CHIRP_TOTAL_SECS,
            chirp_peak_gain: CHIRP_PEAK_GAIN,
            chirp_floor_gain: CHIRP_FLOOR_GAIN,
            voice_capacity: CHIRP_VOICE_CAPACITY,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid_and_contiguous() {
        let segments = default_segments();
        PresentationConfig::new(segments.clone()).expect("default table validates");
        assert_eq!(segments.first().map(|s| s.start), Some(0.0));
        assert_eq!(segments.last().map(|s| s.end), Some(LOOP_DURATION));
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn default_ambience_is_valid() {
        AmbienceConfig::default().validate().expect("default ranges");
    }

    #[test]
    fn rejects_empty_chirp_ranges() {
        let delay = Duration::from_secs(3);
        let fixed_delay = AmbienceConfig {
            chirp_delay: (delay, delay),
            ..AmbienceConfig::default()
        };
        assert!(matches!(
            fixed_delay.validate(),
            Err(ElytraError::InvalidAmbience(_))
        ));

        let zero_delay = AmbienceConfig {
            chirp_delay: (Duration::ZERO, delay),
            ..AmbienceConfig::default()
        };
        assert!(zero_delay.validate().is_err());

        let inverted_sweep = AmbienceConfig {
            chirp_end_hz: (700.0, 500.0),
            ..AmbienceConfig::default()
        };
        assert!(inverted_sweep.validate().is_err());

        let nan_sweep = AmbienceConfig {
            chirp_start_hz: (f64::NAN, 1400.0),
            ..AmbienceConfig::default()
        };
        assert!(nan_sweep.validate().is_err());
    }

    #[test]
    fn rejects_inverted_segment() {
        let err = PresentationConfig::new(vec![Segment::new("bad", "x", 4.0, 2.0)])
            .expect_err("inverted bounds must fail");
        assert!(matches!(err, ElytraError::InvalidSegment { ref id, .. } if id == "bad"));
    }

    #[test]
    fn rejects_segment_past_loop_end() {
        let err = PresentationConfig::new(vec![Segment::new("late", "x", 10.0, 16.0)])
            .expect_err("end beyond loop must fail");
        assert!(matches!(err, ElytraError::InvalidSegment { .. }));
    }

    #[test]
    fn rejects_duplicate_ids_and_empty_tables() {
        let dup = vec![
            Segment::new("a", "x", 0.0, 5.0),
            Segment::new("a", "y", 5.0, 10.0),
        ];
        assert!(PresentationConfig::new(dup).is_err());
        assert!(matches!(
            PresentationConfig::new(vec![]),
            Err(ElytraError::EmptySegmentTable)
        ));
    }

    #[test]
    fn segment_deserializes_from_camel_case_json() {
        let json = r#"{"id":"s1","text":"hello","start":0,"end":5}"#;
        let segment: Segment = serde_json::from_str(json).expect("parse segment");
        assert_eq!(segment, Segment::new("s1", "hello", 0.0, 5.0));
    }

    #[test]
    fn ambience_defaults_match_constants() {
        let config = AmbienceConfig::default();
        assert_eq!(config.master_gain, 0.05);
        assert_eq!(config.chirp_delay.0, Duration::from_millis(2000));
        assert_eq!(config.chirp_delay.1, Duration::from_millis(5000));
        assert_eq!(config.chirp_start_hz, (1000.0, 1400.0));
        assert_eq!(config.chirp_end_hz, (500.0, 700.0));
        assert!(config.seed.is_none());
        assert_eq!(AmbienceConfig::seeded(9).seed, Some(9));
    }
}
