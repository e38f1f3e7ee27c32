use thiserror::Error;

/// All errors produced by elytra-core.
///
/// None of these reach the viewer: the audio track is decorative, so the
/// engine logs them and degrades to silence instead.
#[derive(Debug, Error)]
pub enum ElytraError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("audio output is unavailable on this host")]
    AudioUnavailable,

    #[error("audio context is closed")]
    ContextClosed,

    #[error("invalid segment '{id}': {reason}")]
    InvalidSegment { id: String, reason: String },

    #[error("segment table is empty")]
    EmptySegmentTable,

    #[error("invalid ambience config: {0}")]
    InvalidAmbience(String),

    #[error("failed to spawn timer thread: {0}")]
    TimerThread(String),
}

pub type Result<T> = std::result::Result<T, ElytraError>;
