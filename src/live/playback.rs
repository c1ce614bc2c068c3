//! Playback scheduling: gapless sequential playback against an output clock.

use std::sync::Arc;

use crate::error::{Result, StrydeError};

/// One inbound chunk of synthesized audio: decoded PCM bytes plus the
/// rate/channel layout asserted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAudioFragment {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A decoded, playable buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Playback duration in seconds.
    pub fn duration(&self) -> f64 {
        let frames = self.samples.len() / usize::from(self.channels.max(1));
        frames as f64 / f64::from(self.sample_rate.max(1))
    }
}

/// Decode little-endian PCM16 bytes into float samples.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if sample_rate == 0 || channels == 0 {
        return Err(StrydeError::Decode(format!(
            "Invalid fragment layout: rate={sample_rate} channels={channels}"
        )));
    }
    if bytes.len() % 2 != 0 {
        return Err(StrydeError::Decode(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

/// The output-side audio device: a clock plus playback scheduling.
pub trait OutputClock: Send + Sync {
    /// Current playback time in seconds.
    fn now(&self) -> f64;

    /// Queue a buffer to start playing at `start_time` (seconds on this clock).
    fn schedule(&self, buffer: AudioBuffer, start_time: f64);

    /// Decode a fragment into a playable buffer.
    fn decode(&self, fragment: &InboundAudioFragment) -> Result<AudioBuffer> {
        decode_pcm16(&fragment.data, fragment.sample_rate, fragment.channels)
    }
}

/// Schedules inbound fragments back-to-back on the output clock.
///
/// The cursor is the end time of the last scheduled buffer; a fragment
/// arriving after playback has drained schedules against live clock time
/// because of the `max` against `now()`.
pub struct PlaybackScheduler {
    clock: Arc<dyn OutputClock>,
    cursor: f64,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn OutputClock>) -> Self {
        Self { clock, cursor: 0.0 }
    }

    /// The next start time that would be used if a fragment arrived now.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Decode and schedule one fragment; returns the chosen start time.
    ///
    /// A decode failure leaves the cursor untouched so the session can skip
    /// the fragment and continue.
    pub fn schedule_fragment(&mut self, fragment: &InboundAudioFragment) -> Result<f64> {
        let buffer = self.clock.decode(fragment)?;
        let start = self.cursor.max(self.clock.now());
        let duration = buffer.duration();
        self.clock.schedule(buffer, start);
        self.cursor = start + duration;
        Ok(start)
    }
}
