//! Audio output via cpal backend.
//!
//! The render graph is moved into the cpal output callback; the returned
//! `AudioContext` keeps the stream alive and controls it.
//!
//! **Not `Send`**: `cpal::Stream` is bound to its creation thread on
//! Windows/macOS. Create and drop the context on the same OS thread.

use std::sync::Arc;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, Host, SampleFormat, SampleRate, Stream, StreamConfig,
};
use tracing::{error, info, warn};

use crate::audio::device::matches_device_name;
use crate::audio::diagnostics::AudioDiagnostics;
use crate::audio::graph::{self, DEFAULT_MAX_BLOCK_FRAMES};
use crate::audio::{AudioContext, ContextBackend, ContextState, SharedContextState};
use crate::config::AmbienceConfig;
use crate::error::{ElytraError, Result};

/// Owns the cpal stream; dropping it stops the callback.
pub struct CpalBackend {
    stream: Option<Stream>,
}

impl ContextBackend for CpalBackend {
    fn resume(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(ElytraError::ContextClosed)?;
        stream
            .play()
            .map_err(|e| ElytraError::AudioStream(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("failed to pause output stream before close: {e}");
            }
            // Stream drops here, releasing the device.
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// Open an output stream on `preferred_device_name`, or the host default.
///
/// With `autoplay` the stream starts immediately (state `Running`); otherwise
/// it is built paused (state `Suspended`) until `AudioContext::resume`.
pub fn open(
    config: &AmbienceConfig,
    preferred_device_name: Option<&str>,
    autoplay: bool,
) -> Result<AudioContext> {
    let host = cpal::default_host();
    let device = pick_output_device(&host, preferred_device_name)?;

    info!(
        device = device.name().unwrap_or_default().as_str(),
        "opening output device"
    );

    let supported = device
        .default_output_config()
        .map_err(|e| ElytraError::AudioDevice(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    info!(sample_rate, channels, "audio config selected");

    let stream_config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let diagnostics = Arc::new(AudioDiagnostics::default());
    let (handle, mut render) =
        graph::build(config, sample_rate, DEFAULT_MAX_BLOCK_FRAMES, diagnostics);
    let ch = channels as usize;

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info| render.render(data, ch),
            |err| error!("audio stream error: {err}"),
            None,
        ),

        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _info| {
                render.render_interleaved(data, ch, |s| {
                    (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                })
            },
            |err| error!("audio stream error: {err}"),
            None,
        ),

        SampleFormat::U16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [u16], _info| {
                render.render_interleaved(data, ch, |s| {
                    ((s.clamp(-1.0, 1.0) * 0.5 + 0.5) * u16::MAX as f32) as u16
                })
            },
            |err| error!("audio stream error: {err}"),
            None,
        ),

        fmt => {
            return Err(ElytraError::AudioStream(format!(
                "unsupported sample format: {fmt:?}"
            )))
        }
    }
    .map_err(|e| ElytraError::AudioStream(e.to_string()))?;

    let initial = if autoplay {
        stream
            .play()
            .map_err(|e| ElytraError::AudioStream(e.to_string()))?;
        ContextState::Running
    } else {
        if let Err(e) = stream.pause() {
            warn!("output stream could not be paused, it may start early: {e}");
        }
        ContextState::Suspended
    };

    Ok(AudioContext::new(
        Box::new(CpalBackend {
            stream: Some(stream),
        }),
        Arc::new(SharedContextState::new(initial)),
        handle,
    ))
}

/// The named output if the host lists it, else the host default, else the
/// first output listed.
fn pick_output_device(host: &Host, preferred: Option<&str>) -> Result<Device> {
    let named = preferred.and_then(|wanted| {
        let found = host
            .output_devices()
            .map_err(|e| warn!("cannot list outputs to find '{wanted}': {e}"))
            .ok()?
            .find(|device| {
                device
                    .name()
                    .is_ok_and(|name| matches_device_name(&name, wanted))
            });
        if found.is_none() {
            warn!(wanted, "preferred output device missing, using the default");
        }
        found
    });
    if let Some(device) = named.or_else(|| host.default_output_device()) {
        return Ok(device);
    }

    warn!("no default output device, taking the first one listed");
    host.output_devices()
        .map_err(|e| ElytraError::AudioDevice(e.to_string()))?
        .next()
        .ok_or(ElytraError::NoDefaultOutputDevice)
}
