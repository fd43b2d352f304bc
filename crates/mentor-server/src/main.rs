//! faith-mentor HTTP Server
//!
//! Axum-based server wiring the subscription, payment-reconciliation and
//! mentorship-generation engines behind a REST API. The payment gateway
//! drives account state exclusively through the webhook route.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentor_core::{MemoryAccountStore, MemoryJournal, MentorProvider, MentorshipService};
use mentor_payments::{LogNotifier, MercadoPagoClient, WelcomeNotifier};
use mentor_runtime::GeminiProvider;

use crate::handlers::{
    dashboard, delete_journal_entry, gateway_webhook, get_journal_entry, health_check,
    list_journal, list_plans, quota_status, register_checkout, request_mentorship,
    upgrade_checkout,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize the content generator
    let provider: Arc<dyn MentorProvider> = Arc::new(GeminiProvider::from_env()?);

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to the mentorship generator"),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Generator not reachable - mentorship requests will fail");
            tracing::warn!("  Check GEMINI_API_KEY and network access");
        }
    }

    // Initialize stores
    let store = Arc::new(MemoryAccountStore::new());
    let journal = Arc::new(MemoryJournal::new());

    let mentorship = Arc::new(MentorshipService::new(
        store.clone(),
        journal.clone(),
        provider.clone(),
    ));

    // Initialize payments
    let gateway = MercadoPagoClient::from_env().ok().map(Arc::new);
    let webhook_secret = std::env::var("MP_WEBHOOK_SECRET").ok();

    if gateway.is_some() {
        tracing::info!("✓ Payment gateway configured");
        if webhook_secret.is_none() {
            tracing::warn!("⚠ MP_WEBHOOK_SECRET not set - webhook signatures unverified");
        }
    } else {
        tracing::warn!("⚠ Payment gateway not configured - checkout disabled");
        tracing::warn!("  Set MP_ACCESS_TOKEN in .env");
    }

    let notifier: Arc<dyn WelcomeNotifier> = Arc::new(LogNotifier);
    let base_url =
        std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());

    // Build application state
    let app_state = AppState {
        store,
        journal,
        provider,
        mentorship,
        gateway,
        notifier,
        base_url,
        webhook_secret,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & catalog
        .route("/health", get(health_check))
        .route("/api/plans", get(list_plans))
        // Checkout
        .route("/api/checkout/register", post(register_checkout))
        .route("/api/checkout/upgrade", post(upgrade_checkout))
        // Payment gateway notifications
        .route("/webhook/mercadopago", post(gateway_webhook))
        // Account usage & mentorship
        .route("/api/quota", get(quota_status))
        .route("/api/mentorship", post(request_mentorship))
        .route("/api/journal", get(list_journal))
        .route(
            "/api/journal/{id}",
            get(get_journal_entry).delete(delete_journal_entry),
        )
        .route("/api/dashboard", get(dashboard))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🌱 faith-mentor server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                - Health check");
    tracing::info!("  GET    /api/plans             - Plan catalog");
    tracing::info!("  POST   /api/checkout/register - Begin registration checkout");
    tracing::info!("  POST   /api/checkout/upgrade  - Begin upgrade checkout");
    tracing::info!("  POST   /webhook/mercadopago   - Gateway notifications");
    tracing::info!("  GET    /api/quota             - Monthly usage status");
    tracing::info!("  POST   /api/mentorship        - Generate a mentorship");
    tracing::info!("  GET    /api/journal           - Mentorship history");
    tracing::info!("  GET    /api/dashboard         - History dashboard");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
