//! cpal-backed device audio adapters for the live session traits.

pub mod input;
pub mod output;

pub use input::CpalMicrophone;
pub use output::CpalOutput;
