//! Error Types

use thiserror::Error;

/// Result type alias for mentor operations
pub type Result<T> = std::result::Result<T, MentorError>;

/// Domain error types
#[derive(Error, Debug)]
pub enum MentorError {
    /// Plan name does not match any catalog entry
    #[error("Unknown subscription plan: {0}")]
    UnknownPlan(String),

    /// No account exists for the given email
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account exists but was never activated by a confirmed payment
    #[error("Account not activated: {0}")]
    AccountInactive(String),

    /// Email is already bound to an active account
    #[error("Email already registered: {0}")]
    EmailAlreadyRegistered(String),

    /// Monthly allowance used up; an expected outcome, not a fault
    #[error("Monthly quota exceeded: {used}/{limit}")]
    QuotaExceeded { used: u32, limit: u32 },

    /// Content generator unreachable or erroring
    #[error("Generator unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Generator responded with something that does not parse as the
    /// mentorship schema
    #[error("Malformed generator response: {0}")]
    MalformedUpstreamResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MentorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MentorError::UpstreamUnavailable(_) | MentorError::Storage(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            MentorError::UnknownPlan(name) => format!("The plan '{}' does not exist.", name),
            MentorError::AccountNotFound(_) => "We could not find an account for that email.".into(),
            MentorError::AccountInactive(_) => {
                "Your account is awaiting payment confirmation.".into()
            }
            MentorError::EmailAlreadyRegistered(email) => {
                format!("The email {} is already registered. Please sign in.", email)
            }
            MentorError::QuotaExceeded { limit, .. } => format!(
                "You have used all {} mentorships included in your plan this month.",
                limit
            ),
            MentorError::UpstreamUnavailable(_) => {
                "The mentor service is currently unavailable. Please try again.".into()
            }
            MentorError::MalformedUpstreamResponse(_) => {
                "The mentor service returned an unexpected answer. Please try again.".into()
            }
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for MentorError {
    fn from(err: anyhow::Error) -> Self {
        MentorError::Storage(err.to_string())
    }
}
