//! Playback output via cpal: a sample-counter clock plus a scheduled queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, warn};

use super::input::convert_to_mono_resampled;
use crate::error::{Result, StrydeError};
use crate::live::playback::{AudioBuffer, OutputClock};

/// Wrapper for cpal::Stream to make it Send + Sync.
///
/// SAFETY: the stream is only held to keep playback alive and dropped at the
/// end; no method is ever called on it across threads.
struct SendableStream(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for SendableStream {}
unsafe impl Sync for SendableStream {}

struct Scheduled {
    start: u64,
    samples: Vec<f32>,
}

struct OutputState {
    queue: VecDeque<Scheduled>,
    position: u64,
}

impl OutputState {
    /// Sample value at absolute position `t`, consuming exhausted buffers.
    ///
    /// Gaps between scheduled windows play silence; the scheduler keeps
    /// windows contiguous, so silence only covers genuine idle periods.
    fn sample_at(&mut self, t: u64) -> f32 {
        while let Some(front) = self.queue.front() {
            let end = front.start + front.samples.len() as u64;
            if end <= t {
                self.queue.pop_front();
                continue;
            }
            if t < front.start {
                return 0.0;
            }
            return front.samples[(t - front.start) as usize];
        }
        0.0
    }
}

/// Output clock backed by a cpal output stream.
///
/// Time is derived from the number of samples the device callback has
/// consumed, so `now()` tracks actual playback rather than wall time.
pub struct CpalOutput {
    state: Arc<Mutex<OutputState>>,
    sample_rate: u32,
    _stream: SendableStream,
}

impl CpalOutput {
    /// Open the default output device at the given rate.
    pub fn open(sample_rate: u32) -> Result<Arc<Self>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| StrydeError::Device("No output device available".into()))?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let state = Arc::new(Mutex::new(OutputState {
            queue: VecDeque::new(),
            position: 0,
        }));

        let callback_state = Arc::clone(&state);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut state = match callback_state.lock() {
                        Ok(state) => state,
                        Err(_) => return,
                    };
                    for slot in data.iter_mut() {
                        let t = state.position;
                        *slot = state.sample_at(t);
                        state.position += 1;
                    }
                },
                |err| warn!(error = %err, "Playback stream error"),
                None,
            )
            .map_err(|e| StrydeError::Device(format!("Failed to open playback stream: {e}")))?;

        stream
            .play()
            .map_err(|e| StrydeError::Device(format!("Failed to start playback stream: {e}")))?;

        debug!(rate = sample_rate, "Playback output started");

        Ok(Arc::new(Self {
            state,
            sample_rate,
            _stream: SendableStream(stream),
        }))
    }
}

impl OutputClock for CpalOutput {
    fn now(&self) -> f64 {
        let state = self.state.lock().expect("output state lock");
        state.position as f64 / f64::from(self.sample_rate)
    }

    fn schedule(&self, buffer: AudioBuffer, start_time: f64) {
        let samples = convert_to_mono_resampled(
            &buffer.samples,
            usize::from(buffer.channels.max(1)),
            buffer.sample_rate,
            self.sample_rate,
        );
        let start = (start_time * f64::from(self.sample_rate)).round().max(0.0) as u64;

        let mut state = self.state.lock().expect("output state lock");
        state.queue.push_back(Scheduled { start, samples });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_plays_silence_in_gaps_and_consumes_buffers() {
        let mut state = OutputState {
            queue: VecDeque::new(),
            position: 0,
        };
        state.queue.push_back(Scheduled {
            start: 2,
            samples: vec![0.5, 0.6],
        });
        state.queue.push_back(Scheduled {
            start: 4,
            samples: vec![0.7],
        });

        let played: Vec<f32> = (0..6).map(|t| state.sample_at(t)).collect();
        assert_eq!(played, vec![0.0, 0.0, 0.5, 0.6, 0.7, 0.0]);
        assert!(state.queue.is_empty());
    }
}
