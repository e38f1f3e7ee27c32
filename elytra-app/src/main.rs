//! Elytra terminal host.
//!
//! ## Runtime note
//!
//! A cpal-backed `AudioContext` is `!Send`, so the engine lives on the main
//! task of a current-thread runtime and is never moved. The caption loop,
//! the gesture (Enter key), Ctrl-C and the run deadline are multiplexed with
//! `tokio::select!` on that same task.

mod cli;
mod render;
mod settings;
mod view;

use std::io::BufRead;
use std::time::Instant;

use clap::Parser;
use elytra_core::audio::device::list_output_devices;
use elytra_core::{
    AmbienceConfig, AmbientAudioEngine, AnimationLoop, PacedFrameSource, PresentationConfig,
    TimerDrive,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use cli::Args;
use view::CaptionView;

const DEFAULT_LOG_FILTER: &str = "elytra=info,elytra_core=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        for device in list_output_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{marker}", device.name);
        }
        return Ok(());
    }

    let ambience = AmbienceConfig {
        seed: args.seed,
        ..AmbienceConfig::default()
    };

    if let Some(path) = args.render_wav.as_deref() {
        let report = render::render_wav(path, ambience, args.render_sample_rate, args.render_seconds)?;
        println!(
            "wrote {} frames ({} chirps, peak {:.4}) to {}",
            report.frames,
            report.chirps,
            report.peak,
            path.display()
        );
        return Ok(());
    }

    let presentation = settings::load_presentation(args.segments.as_deref());
    run(&args, presentation, ambience).await
}

fn open_engine(args: &Args, config: AmbienceConfig) -> anyhow::Result<AmbientAudioEngine> {
    if args.no_audio {
        return Ok(AmbientAudioEngine::new(config, None, TimerDrive::Thread)?);
    }
    let autoplay = !args.require_gesture;
    let context = match elytra_core::audio::open_output(&config, args.device.as_deref(), autoplay)
    {
        Ok(context) => Some(context),
        Err(e) => {
            warn!("audio unavailable, captions only: {e}");
            None
        }
    };
    Ok(AmbientAudioEngine::new(config, context, TimerDrive::Thread)?)
}

/// Each line on stdin is one user gesture.
///
/// Reads on a plain thread: a blocking stdin read cannot be cancelled, and
/// parking it on the runtime's blocking pool would stall shutdown.
fn spawn_gesture_reader() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("elytra-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("no stdin reader, gestures disabled: {e}");
    }
    rx
}

async fn run(
    args: &Args,
    presentation: PresentationConfig,
    ambience: AmbienceConfig,
) -> anyhow::Result<()> {
    let mut engine = open_engine(args, ambience)?;
    let mut status_rx = engine.subscribe_status();
    engine.start();

    if args.require_gesture && !args.no_audio {
        info!("press Enter to start the ambience");
    }

    let mut view = CaptionView::new(std::io::stdout(), args.json);
    let mut animation = AnimationLoop::new(presentation, PacedFrameSource::new());
    animation.start();

    let mut ticker = tokio::time::interval(args.frame_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut gestures = spawn_gesture_reader();
    let mut stdin_open = true;

    let deadline = args
        .duration
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| tokio::time::Instant::now() + std::time::Duration::from_secs_f64(secs));
    let run_out = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(run_out);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    let result: anyhow::Result<()> = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(request) = animation.source_mut().take_due() else { continue };
                if let Some(frame) = animation.on_frame(request, Instant::now()) {
                    if let Err(e) = view.draw(&frame) {
                        break Err(anyhow::Error::new(e).context("writing caption frame"));
                    }
                }
            }
            gesture = gestures.recv(), if stdin_open => match gesture {
                Some(()) => engine.notify_user_gesture(),
                None => stdin_open = false,
            },
            Ok(event) = status_rx.recv() => {
                if let Err(e) = view.status(&event) {
                    break Err(anyhow::Error::new(e).context("writing status event"));
                }
            }
            signal = &mut ctrl_c, if ctrl_c_armed => match signal {
                Ok(()) => break Ok(()),
                Err(e) => {
                    warn!("Ctrl-C handler unavailable: {e}");
                    ctrl_c_armed = false;
                }
            },
            _ = &mut run_out => break Ok(()),
        }
    };

    animation.stop();
    engine.teardown();
    if let Err(e) = view.finish() {
        warn!("failed to finish caption output: {e}");
    }
    info!(diagnostics = ?engine.diagnostics_snapshot(), "elytra stopped");
    result
}
