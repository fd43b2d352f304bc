//! Application State

use std::sync::Arc;

use mentor_core::{MemoryAccountStore, MemoryJournal, MentorProvider, MentorshipService};
use mentor_payments::{MercadoPagoClient, WelcomeNotifier};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Account store, the single source of truth for subscriber state
    pub store: Arc<MemoryAccountStore>,

    /// Mentorship history
    pub journal: Arc<MemoryJournal>,

    /// Content generator (Gemini, etc.)
    pub provider: Arc<dyn MentorProvider>,

    /// Generation flow behind the quota contract
    pub mentorship: Arc<MentorshipService<MemoryAccountStore, MemoryJournal>>,

    /// Payment gateway client (None if not configured)
    pub gateway: Option<Arc<MercadoPagoClient>>,

    /// Welcome notification boundary
    pub notifier: Arc<dyn WelcomeNotifier>,

    /// Public base URL used for gateway callback routes
    pub base_url: String,

    /// Webhook signature secret; verification is skipped when unset
    pub webhook_secret: Option<String>,
}
