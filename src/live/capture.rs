//! Capture pipeline: microphone blocks → fixed frames → transport encoding.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::{mpsc, watch};

use super::channel::LiveSender;
use crate::error::Result;

/// Samples per outbound frame.
pub const FRAME_SAMPLES: usize = 4096;

/// A capture frame encoded for transport: base64 PCM16 plus its MIME tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub mime_type: String,
    pub data: String,
}

/// Source of live microphone input.
///
/// Implementations acquire the device stream; acquisition failure (most
/// commonly a permission denial) aborts session startup.
#[async_trait]
pub trait MicrophoneSource: Send + Sync {
    async fn open(&self) -> Result<CaptureStream>;
}

/// An open capture stream: sample rate, a receiver of float sample blocks,
/// and an opaque guard that keeps the device stream alive until dropped.
pub struct CaptureStream {
    pub sample_rate: u32,
    pub blocks: mpsc::UnboundedReceiver<Vec<f32>>,
    guard: Option<Box<dyn std::any::Any + Send>>,
}

impl CaptureStream {
    pub fn new(sample_rate: u32, blocks: mpsc::UnboundedReceiver<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            blocks,
            guard: None,
        }
    }

    /// Attach a keep-alive guard (the device stream handle).
    pub fn with_guard(mut self, guard: Box<dyn std::any::Any + Send>) -> Self {
        self.guard = Some(guard);
        self
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("sample_rate", &self.sample_rate)
            .field("guard", &self.guard.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Accumulates float sample blocks and drains fixed-size frames.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: Vec<f32>,
    frame_samples: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_frame_samples(FRAME_SAMPLES)
    }

    pub fn with_frame_samples(frame_samples: usize) -> Self {
        Self {
            pending: Vec::new(),
            frame_samples,
        }
    }

    /// Append a block; return every complete frame now available.
    /// The remainder stays buffered for the next block.
    pub fn push(&mut self, block: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(block);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            frames.push(std::mem::replace(&mut self.pending, rest));
        }
        frames
    }
}

/// Convert a float sample in [-1, 1] to a signed 16-bit integer.
///
/// Clamped so that full-scale input (±1.0) cannot wrap around.
pub fn pcm_to_int16(sample: f32) -> i16 {
    let scaled = (f64::from(sample) * 32768.0).round();
    scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// Encode a frame of float samples as base64 little-endian PCM16.
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> EncodedFrame {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&pcm_to_int16(sample).to_le_bytes());
    }
    EncodedFrame {
        mime_type: format!("audio/pcm;rate={sample_rate}"),
        data: BASE64.encode(&bytes),
    }
}

/// Drive the capture stream into the channel until shutdown or stream end.
///
/// Dropping the stream here releases the device guard.
pub(crate) async fn run_capture(
    mut stream: CaptureStream,
    outbound: LiveSender,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut frames = FrameBuffer::new();
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            block = stream.blocks.recv() => {
                match block {
                    Some(samples) => {
                        for frame in frames.push(&samples) {
                            outbound.send(encode_frame(&frame, stream.sample_rate));
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int16_conversion_clamps_full_scale() {
        assert_eq!(pcm_to_int16(1.0), i16::MAX);
        assert_eq!(pcm_to_int16(-1.0), i16::MIN);
        assert_eq!(pcm_to_int16(0.0), 0);
        assert_eq!(pcm_to_int16(0.5), 16384);
        assert_eq!(pcm_to_int16(2.0), i16::MAX);
        assert_eq!(pcm_to_int16(-2.0), i16::MIN);
    }

    #[test]
    fn int16_conversion_stays_in_range_across_the_interval() {
        let mut sample = -1.0f32;
        while sample <= 1.0 {
            let value = i32::from(pcm_to_int16(sample));
            assert!((i32::from(i16::MIN)..=i32::from(i16::MAX)).contains(&value));
            sample += 0.001;
        }
    }

    #[test]
    fn frame_buffer_drains_fixed_frames_and_keeps_remainder() {
        let mut buffer = FrameBuffer::with_frame_samples(4);
        assert!(buffer.push(&[0.1, 0.2]).is_empty());

        let frames = buffer.push(&[0.3, 0.4, 0.5]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![0.1, 0.2, 0.3, 0.4]);

        let frames = buffer.push(&[0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![0.5, 0.6, 0.7, 0.8]);
        assert_eq!(frames[1], vec![0.9, 1.0, 1.1, 1.2]);
    }

    #[test]
    fn encoded_frame_carries_mime_tag_and_le_bytes() {
        let frame = encode_frame(&[0.0, 0.5], 16_000);
        assert_eq!(frame.mime_type, "audio/pcm;rate=16000");

        let bytes = BASE64.decode(frame.data.as_bytes()).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x00, 0x40]);
    }
}
