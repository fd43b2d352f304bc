//! Account Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::Plan;

/// A registered subscriber.
///
/// Created inactive at the first checkout attempt and only becomes usable
/// once a confirmed payment flips `activated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier
    pub id: Uuid,

    pub name: String,

    /// Unique email, compared case-insensitively
    pub email: String,

    /// Tax id collected at checkout (forwarded to the payment gateway)
    pub identification_number: Option<String>,

    /// Subscription tier
    pub plan: Plan,

    /// Mentorships consumed in the current calendar month
    pub monthly_usage_count: u32,

    /// Start of the current counting month
    pub last_usage_window_start: DateTime<Utc>,

    /// Whether a confirmed payment has activated the account
    pub activated: bool,

    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Pre-register an inactive account at the first checkout attempt
    pub fn pre_register(
        name: impl Into<String>,
        email: impl Into<String>,
        identification_number: Option<String>,
        plan: Plan,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            identification_number,
            plan,
            monthly_usage_count: 0,
            last_usage_window_start: now,
            activated: false,
            created_at: now,
        }
    }

    /// Refresh an abandoned pre-registration with new checkout details.
    ///
    /// The account stays inactive until a payment confirms it.
    pub fn refresh_pre_registration(
        &mut self,
        name: impl Into<String>,
        identification_number: Option<String>,
        plan: Plan,
    ) {
        self.name = name.into();
        self.identification_number = identification_number;
        self.plan = plan;
    }
}
