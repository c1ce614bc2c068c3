//! Live voice session: capture pipeline, duplex channel, gapless playback,
//! and turn-level transcripts.
//!
//! The session is a thin client of the remote live endpoint. Outbound,
//! microphone blocks are framed, converted to PCM16, base64-encoded, and
//! streamed over the channel; inbound, audio fragments are scheduled
//! back-to-back on the output clock while partial transcripts fold into
//! sealed turns.

pub mod capture;
pub mod channel;
pub mod config;
pub mod events;
pub mod playback;
pub mod session;
pub mod transcript;

pub use capture::{encode_frame, pcm_to_int16, CaptureStream, EncodedFrame, MicrophoneSource};
pub use channel::{LiveChannel, LiveSender};
pub use config::{LiveConfig, DEFAULT_LIVE_MODEL};
pub use events::LiveEvent;
pub use playback::{AudioBuffer, InboundAudioFragment, OutputClock, PlaybackScheduler};
pub use session::{LiveSession, SessionState, SessionUpdate};
pub use transcript::{TranscriptAssembler, TranscriptTurn};
