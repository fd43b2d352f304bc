//! Welcome Notification Boundary
//!
//! Outbound email lives behind this trait. The reconciler treats a send
//! failure as log-and-continue; it never fails or undoes an activation.

use async_trait::async_trait;
use mentor_core::Account;

use crate::error::Result;

/// Boundary trait for the welcome notification
#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn send_welcome(&self, account: &Account) -> Result<()>;
}

/// Logs the welcome message instead of delivering it (development default)
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl WelcomeNotifier for LogNotifier {
    async fn send_welcome(&self, account: &Account) -> Result<()> {
        tracing::info!(
            email = %account.email,
            name = %account.name,
            plan = %account.plan,
            "welcome email: subscription to {} is active",
            account.plan.pricing().display_name
        );
        Ok(())
    }
}
