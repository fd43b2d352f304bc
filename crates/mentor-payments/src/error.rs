//! Payment Error Types

use mentor_core::{MentorError, Plan};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Plan name does not match any catalog entry
    #[error("Unknown subscription plan: {0}")]
    UnknownPlan(String),

    /// Target plan is not a strict upgrade over the current one
    #[error("Cannot change plan from {from} to {to}")]
    InvalidTransition { from: Plan, to: Plan },

    /// External reference does not decode into its four fields
    #[error("Malformed checkout reference: {0}")]
    MalformedReference(String),

    /// No account matches the decoded email
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Gateway unreachable or erroring; the only retryable notification fault
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Gateway(_) | PaymentError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::UnknownPlan(_) => "The selected plan does not exist.",
            PaymentError::InvalidTransition { .. } => {
                "You can only move to a plan with a larger monthly allowance."
            }
            PaymentError::Gateway(_) => "Payment processing failed. Please try again.",
            PaymentError::AccountNotFound(_) => "We could not find an account for that email.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}

impl From<MentorError> for PaymentError {
    fn from(err: MentorError) -> Self {
        match err {
            MentorError::UnknownPlan(name) => PaymentError::UnknownPlan(name),
            MentorError::AccountNotFound(email) => PaymentError::AccountNotFound(email),
            other => PaymentError::Storage(other.to_string()),
        }
    }
}
