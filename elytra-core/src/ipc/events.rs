//! Values handed to the host: caption frames for the rendering layer and
//! status events from the ambient audio engine.
//!
//! Everything serializes as camelCase JSON so a web or terminal front end can
//! consume the same shapes (`elytra --json` prints one `CaptionFrame` per line).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Caption frames
// ---------------------------------------------------------------------------

/// Per-tick caption output: every segment with its current opacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionFrame {
    /// Loop time the frame was computed for, in `[0, loop_duration)`.
    pub loop_time: f64,
    /// One entry per configured segment, in table order.
    pub captions: Vec<CaptionState>,
}

impl CaptionFrame {
    pub fn opacity_of(&self, id: &str) -> Option<f64> {
        self.captions
            .iter()
            .find(|caption| caption.id == id)
            .map(|caption| caption.opacity)
    }

    /// The caption with the highest non-zero opacity, if any is visible.
    pub fn most_visible(&self) -> Option<&CaptionState> {
        self.captions
            .iter()
            .filter(|caption| caption.opacity > 0.0)
            .max_by(|a, b| a.opacity.total_cmp(&b.opacity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionState {
    pub id: String,
    pub text: String,
    /// In `[0, 1]`; recomputed every frame.
    pub opacity: f64,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted whenever the ambient audio engine changes state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. why audio stayed silent).
    pub detail: Option<String>,
}

/// Lifecycle of `AmbientAudioEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created; waiting for an unsuspended context or a user gesture.
    /// Also the resting state of an engine without usable audio.
    Uninitialized,
    /// Noise running and chirps scheduled.
    Active,
    /// Torn down. Terminal.
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CaptionFrame {
        CaptionFrame {
            loop_time: 4.5,
            captions: vec![
                CaptionState {
                    id: "segment-1".into(),
                    text: "Beetles".into(),
                    opacity: 0.5,
                },
                CaptionState {
                    id: "segment-2".into(),
                    text: "Elytra".into(),
                    opacity: 0.0,
                },
            ],
        }
    }

    #[test]
    fn caption_frame_serializes_with_camel_case() {
        let json = serde_json::to_value(frame()).expect("serialize caption frame");
        let loop_time = json["loopTime"]
            .as_f64()
            .expect("loopTime should serialize as number");
        assert!((loop_time - 4.5).abs() < 1e-12);
        assert_eq!(json["captions"][0]["id"], "segment-1");
        assert_eq!(json["captions"][1]["text"], "Elytra");

        let round_trip: CaptionFrame =
            serde_json::from_value(json).expect("deserialize caption frame");
        assert_eq!(round_trip, frame());
    }

    #[test]
    fn most_visible_skips_dark_captions() {
        let mut f = frame();
        assert_eq!(f.most_visible().map(|c| c.id.as_str()), Some("segment-1"));
        f.captions[0].opacity = 0.0;
        assert!(f.most_visible().is_none());
        assert_eq!(f.opacity_of("segment-2"), Some(0.0));
        assert_eq!(f.opacity_of("missing"), None);
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Uninitialized,
            detail: Some("waiting for gesture".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "uninitialized");
        assert_eq!(json["detail"], "waiting for gesture");
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<EngineStatus>(r#""Active""#);
        assert!(err.is_err(), "expected invalid casing to fail");
        let ok = serde_json::from_str::<EngineStatus>(r#""active""#).expect("lowercase parses");
        assert_eq!(ok, EngineStatus::Active);
    }
}
