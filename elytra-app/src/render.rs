//! Offline render: the ambience on simulated time, written to a WAV file.

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context};
use elytra_core::config::NOISE_BLOCK_FRAMES;
use elytra_core::{AmbienceConfig, AmbientAudioEngine, ContextState, OfflineBackend, TimerDrive};
use tracing::info;

/// Summary of a finished render.
#[derive(Debug, Clone, Copy)]
pub struct RenderReport {
    pub frames: usize,
    pub chirps: usize,
    pub peak: f32,
}

/// Render `seconds` of ambience to a mono 32-bit float WAV at `path`.
///
/// `seconds` must be finite and not negative; nothing is written otherwise.
pub fn render_wav(
    path: &Path,
    config: AmbienceConfig,
    sample_rate: u32,
    seconds: f64,
) -> anyhow::Result<RenderReport> {
    ensure!(
        seconds.is_finite() && seconds >= 0.0,
        "render length must be a finite number of seconds, got {seconds}"
    );
    ensure!(sample_rate > 0, "sample rate must be positive");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;

    let (context, mut renderer) = OfflineBackend::open(&config, sample_rate, ContextState::Running);
    let mut engine = AmbientAudioEngine::new(config, Some(context), TimerDrive::Manual)?;
    engine.start();

    let total_frames = (seconds * sample_rate as f64).round() as usize;
    let mut block = vec![0.0f32; NOISE_BLOCK_FRAMES];
    let mut written = 0usize;
    let mut chirps = 0usize;
    let mut peak = 0.0f32;

    while written < total_frames {
        let n = (total_frames - written).min(block.len());
        let now = Duration::from_secs_f64(written as f64 / sample_rate as f64);
        chirps += engine.advance_timers(now);

        let block = &mut block[..n];
        renderer.render(block, 1);
        for &sample in block.iter() {
            peak = peak.max(sample.abs());
            writer.write_sample(sample)?;
        }
        written += n;
    }

    engine.teardown();
    writer.finalize().context("finalizing WAV file")?;

    info!(
        path = %path.display(),
        seconds,
        chirps,
        peak,
        "offline render written"
    );
    Ok(RenderReport {
        frames: written,
        chirps,
        peak,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_readable_wav() {
        let path = std::env::temp_dir().join(format!("elytra-render-{}.wav", std::process::id()));
        let report = render_wav(&path, AmbienceConfig::seeded(5), 8_000, 12.0).expect("render");

        assert_eq!(report.frames, 96_000);
        assert!((2..=6).contains(&report.chirps), "chirps = {}", report.chirps);
        assert!(report.peak > 0.0 && report.peak < 0.2);

        let reader = hound::WavReader::open(&path).expect("open wav");
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 96_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_unbounded_lengths() {
        let path = std::env::temp_dir().join(format!("elytra-inf-{}.wav", std::process::id()));
        for seconds in [f64::INFINITY, f64::NAN, -1.0] {
            let err = render_wav(&path, AmbienceConfig::seeded(6), 8_000, seconds)
                .expect_err("length must be rejected");
            assert!(err.to_string().contains("finite"), "{err}");
        }
        assert!(!path.exists());
    }
}
