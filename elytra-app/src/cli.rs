//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "elytra")]
#[command(about = "Looping beetle captions over a procedural forest ambience", long_about = None)]
pub struct Args {
    /// JSON caption table: { "segments": [{ "id", "text", "start", "end" }] }
    #[arg(long, value_name = "FILE")]
    pub segments: Option<PathBuf>,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Caption refresh rate
    #[arg(long, value_name = "FPS", default_value = "30")]
    pub fps: f64,

    /// Keep audio suspended until Enter is pressed
    #[arg(long)]
    pub require_gesture: bool,

    /// Captions only
    #[arg(long)]
    pub no_audio: bool,

    /// Preferred output device name
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print one JSON caption frame per line instead of the caption line
    #[arg(long)]
    pub json: bool,

    /// Fixed seed for noise and chirps
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Render the ambience to a WAV file instead of playing it
    #[arg(long, value_name = "FILE")]
    pub render_wav: Option<PathBuf>,

    /// Length of the offline render
    #[arg(long, value_name = "SECONDS", default_value = "30")]
    pub render_seconds: f64,

    /// Sample rate of the offline render
    #[arg(long, value_name = "HZ", default_value = "48000")]
    pub render_sample_rate: u32,
}

impl Args {
    /// Frame period, falling back to 30 fps for nonsensical rates.
    pub fn frame_period(&self) -> std::time::Duration {
        let fps = if self.fps.is_finite() && self.fps > 0.0 {
            self.fps.min(240.0)
        } else {
            30.0
        };
        std::time::Duration::from_secs_f64(1.0 / fps)
    }
}
