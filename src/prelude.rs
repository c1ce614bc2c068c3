//! Convenience re-exports for common use.

pub use crate::coach::{CoachService, GroundedAnswer, MealAnalysis};
pub use crate::config::StrydeConfig;
pub use crate::error::{Result, StrydeError};
pub use crate::provider::{
    Citation, CoachChat, Content, GeminiClient, GenerateRequest, GenerateResponse, GeneratedMedia,
    InlineData, Part, VideoRequest,
};

#[cfg(feature = "live")]
pub use crate::live::{
    LiveConfig, LiveSession, SessionState, SessionUpdate, TranscriptTurn,
};
