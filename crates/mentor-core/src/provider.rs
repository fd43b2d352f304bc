//! Mentor Provider Strategy
//!
//! Defines the interface to the external content generator. The service
//! works exclusively through this trait, so backends can be swapped without
//! touching quota or account logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A structured mentorship generated for one challenge.
///
/// The six fields are the fixed structured-output schema sent to the
/// generator; a response that does not parse as this shape is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipRecord {
    /// Central theme(s) identified in the challenge
    pub identified_theme: String,

    /// The central biblical passage for the challenge
    pub anchor_passage: String,

    /// Reflection and counsel in a warm, personal tone
    pub applied_reflection: String,

    /// Three concrete, actionable steps
    pub practical_steps: String,

    /// Further passages for contextual study
    pub cross_references: String,

    /// A short prayer grounded in the challenge and passage
    pub closing_prayer: String,
}

/// Strategy trait for mentorship generators
#[async_trait]
pub trait MentorProvider: Send + Sync {
    /// Generate a structured mentorship for a free-text challenge
    async fn generate(&self, challenge: &str) -> Result<MentorshipRecord>;

    /// Check if the generator is reachable and configured correctly
    async fn health_check(&self) -> Result<bool>;
}
