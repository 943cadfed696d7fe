//! CPAL audio backend
//!
//! Builds one output stream on the default device and moves the realtime
//! [`Engine`] into its callback. No mutex anywhere: the callback owns the
//! engine, the UI owns the controller, and the two meet only at the
//! lock-free queues.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │     UI Thread    │──requests──────────►│                     │
//! │ (EngineController│◄─responses──────────│  CPAL Audio Thread  │
//! │    + mirror)     │◄─deferred work──────│    (owns Engine)    │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::error::{AudioError, AudioResult};
use crate::controller::EngineController;
use crate::engine::Engine;
use crate::types::{StereoSample, SAMPLE_RATE};

/// Frames per callback requested from the device
pub const DEFAULT_BUFFER_SIZE: u32 = 256;

/// Largest callback the engine pre-allocates for, in case the device
/// ignores the requested buffer size
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Keeps the audio stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Start the audio system.
///
/// Creates the engine/controller pair, builds an f32 stereo output stream
/// on the default device, and starts it. Builds with the
/// `session-capture` feature also record the session, written as a WAV
/// when the controller drops.
pub fn start_audio_system() -> AudioResult<(AudioHandle, EngineController)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported_config = pick_output_config(&device)?;
    let sample_rate = supported_config.sample_rate().0;
    if sample_rate != SAMPLE_RATE {
        log::warn!(
            "device runs at {}Hz but the engine is tuned for {}Hz; pitches will be off by a ratio of {:.3}",
            sample_rate,
            SAMPLE_RATE,
            f64::from(sample_rate) / f64::from(SAMPLE_RATE)
        );
    }

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(DEFAULT_BUFFER_SIZE),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        DEFAULT_BUFFER_SIZE,
        (DEFAULT_BUFFER_SIZE as f32 / sample_rate as f32) * 1000.0
    );

    let (engine, controller) = Engine::new_pair();
    if cfg!(feature = "session-capture") {
        log::info!("session capture enabled -> {}", crate::recorder::SESSION_FILE);
    }

    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok((
        AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size: DEFAULT_BUFFER_SIZE,
        },
        controller,
    ))
}

/// Pick the best output configuration: f32, stereo, engine sample rate
fn pick_output_config(device: &cpal::Device) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| SAMPLE_RATE >= c.min_sample_rate().0 && SAMPLE_RATE <= c.max_sample_rate().0)
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No suitable output configuration found".to_string())
        })?;

    let sample_rate = if SAMPLE_RATE >= best_config.min_sample_rate().0
        && SAMPLE_RATE <= best_config.max_sample_rate().0
    {
        cpal::SampleRate(SAMPLE_RATE)
    } else {
        best_config.max_sample_rate()
    };

    Ok(best_config.clone().with_sample_rate(sample_rate))
}

/// Build the output stream, moving the engine into the callback
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: Engine,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    // Pre-allocated frame buffer; the callback only ever takes a sub-slice
    let mut frames = vec![StereoSample::silence(); MAX_BUFFER_SIZE];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = (data.len() / channels).min(MAX_BUFFER_SIZE);
                let output = &mut frames[..n_frames];

                engine.render(output);

                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < output.len() {
                        frame[0] = output[i].left;
                        if channels > 1 {
                            frame[1] = output[i].right;
                        }
                        // Devices with more than two channels get silence
                        // on the extras
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
