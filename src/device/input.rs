//! Microphone capture via cpal.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, StrydeError};
use crate::live::capture::{CaptureStream, MicrophoneSource};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is owned by the capture guard and only dropped, never
/// shared; cpal streams tolerate being dropped from another thread.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendableStream {}

/// Captures mono float blocks at the requested rate from the default (or a
/// named) input device.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device_name: Option<String>,
    sample_rate: u32,
}

impl CpalMicrophone {
    /// Use the system default input device at 16 kHz.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            sample_rate: 16_000,
        }
    }

    pub fn named(device_name: impl Into<String>) -> Self {
        Self {
            device_name: Some(device_name.into()),
            sample_rate: 16_000,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn find_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => {
                let devices = host.input_devices().map_err(|e| {
                    StrydeError::Device(format!("Failed to enumerate input devices: {e}"))
                })?;
                for device in devices {
                    if let Ok(device_name) = device.name() {
                        if device_name == *name {
                            return Ok(device);
                        }
                    }
                }
                Err(StrydeError::Device(format!(
                    "Input device not found: {name}"
                )))
            }
            None => host
                .default_input_device()
                .ok_or_else(|| StrydeError::Device("No input device available".into())),
        }
    }
}

#[async_trait]
impl MicrophoneSource for CpalMicrophone {
    async fn open(&self) -> Result<CaptureStream> {
        let device = self.find_device()?;
        let (blocks_tx, blocks_rx) = mpsc::unbounded_channel::<Vec<f32>>();

        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            warn!(error = %err, "Capture stream error");
        };

        let tx = blocks_tx.clone();
        let stream = match device.build_input_stream(
            &preferred,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(data.to_vec());
            },
            err_callback,
            None,
        ) {
            Ok(stream) => stream,
            Err(_) => {
                // Fall back to the device's native config with software
                // mixing and resampling.
                self.build_native_stream(&device, blocks_tx)?
            }
        };

        stream.play().map_err(|e| {
            StrydeError::PermissionDenied(format!("Failed to start capture stream: {e}"))
        })?;

        debug!(rate = self.sample_rate, "Microphone capture started");

        Ok(CaptureStream::new(self.sample_rate, blocks_rx)
            .with_guard(Box::new(SendableStream(stream))))
    }
}

impl CpalMicrophone {
    fn build_native_stream(
        &self,
        device: &cpal::Device,
        blocks_tx: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<cpal::Stream> {
        let default_config = device.default_input_config().map_err(|e| {
            StrydeError::PermissionDenied(format!("Failed to query input config: {e}"))
        })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = usize::from(default_config.channels());
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.into();

        let err_callback = |err| {
            warn!(error = %err, "Capture stream error");
        };

        device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let block =
                        convert_to_mono_resampled(data, native_channels, native_rate, target_rate);
                    let _ = blocks_tx.send(block);
                },
                err_callback,
                None,
            )
            .map_err(|e| {
                StrydeError::PermissionDenied(format!("Failed to open capture stream: {e}"))
            })
    }
}

/// Mix multi-channel audio to mono and linearly resample to the target rate.
pub(crate) fn convert_to_mono_resampled(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let mono: Vec<f32> = if channels <= 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if source_rate == target_rate || mono.is_empty() {
        return mono;
    }

    let ratio = f64::from(source_rate) / f64::from(target_rate);
    let out_len = (mono.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = mono[idx];
        let b = mono.get(idx + 1).copied().unwrap_or(a);
        out.push(a + (b - a) * frac);
    }
    out
}
