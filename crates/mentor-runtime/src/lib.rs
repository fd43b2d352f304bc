//! # mentor-runtime
//!
//! Generation providers for faith-mentor. Implements the
//! [`mentor_core::MentorProvider`] strategy trait; the domain core never
//! sees which backend produced a mentorship.

mod gemini;

pub use gemini::{GeminiConfig, GeminiProvider};
