//! Caption fade scheduling.
//!
//! ## Opacity policy (first match wins)
//!
//! ```text
//! fade-in   start ≤ t < start + fade        (t - start) / fade
//! fade-out  end - fade ≤ t < end            (end - t) / fade
//! plateau   start ≤ t < end                 1
//! otherwise                                 0
//! ```
//!
//! The segment that opens the loop (`start == 0`) additionally gets a
//! loop-seam fade: for `t > loop - fade` its opacity is capped at
//! `1 - (t - (loop - fade)) / fade`. Its base opacity is already zero in that
//! window, so the cap never changes anything for tables whose first segment
//! ends before the seam. It is kept as-is so the observable fade behaviour
//! stays identical to the published presentation.

use crate::config::{PresentationConfig, Segment};
use crate::ipc::events::{CaptionFrame, CaptionState};

use super::clock::LoopTime;

/// Stateless mapping from loop time to per-segment opacity.
#[derive(Debug, Clone)]
pub struct CaptionScheduler {
    config: PresentationConfig,
}

impl CaptionScheduler {
    pub fn new(config: PresentationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PresentationConfig {
        &self.config
    }

    /// Opacity of `segment` at loop time `t` (seconds), in `[0, 1]`.
    pub fn opacity(&self, segment: &Segment, t: f64) -> f64 {
        let fade = self.config.fade_duration();
        let loop_duration = self.config.loop_duration();

        let fade_in_start = segment.start;
        let fade_out_start = segment.end - fade;

        let mut opacity = if t >= fade_in_start && t < fade_in_start + fade {
            clamp01((t - fade_in_start) / fade)
        } else if t >= fade_out_start && t < segment.end {
            clamp01((segment.end - t) / fade)
        } else if t >= segment.start && t < segment.end {
            1.0
        } else {
            0.0
        };

        if segment.start == 0.0 && t > loop_duration - fade {
            let progress = (t - (loop_duration - fade)) / fade;
            opacity = opacity.min(clamp01(1.0 - progress));
        }

        opacity
    }

    /// Recompute every segment for one frame.
    pub fn frame(&self, time: LoopTime) -> CaptionFrame {
        let t = time.as_secs();
        let captions = self
            .config
            .segments()
            .iter()
            .map(|segment| CaptionState {
                id: segment.id.clone(),
                text: segment.text.clone(),
                opacity: self.opacity(segment, t),
            })
            .collect();

        CaptionFrame {
            loop_time: t,
            captions,
        }
    }
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
