//! Stryde — AI fitness coaching SDK
//!
//! A client for the Gemini API family covering the coaching surfaces: text
//! and chat generation, meal/workout analysis, image/video/speech
//! generation, grounded answers, and a realtime voice session with gapless
//! audio playback and turn-level transcripts.
//!
//! # Quick Start
//!
//! ```no_run
//! use stryde::coach::CoachService;
//!
//! # async fn example() -> stryde::error::Result<()> {
//! let coach = CoachService::from_env()?;
//! let tip = coach.quick_tip().await?;
//! println!("{tip}");
//! # Ok(())
//! # }
//! ```

pub mod coach;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod util;

#[cfg(feature = "live")]
pub mod live;

#[cfg(feature = "device")]
pub mod device;
