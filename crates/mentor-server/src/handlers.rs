//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use mentor_core::{
    Account, AccountStore, DashboardSummary, MentorError, MentorshipEntry, MentorshipJournal,
    MonthlyLimit, Plan, QuotaStatus,
};
use mentor_payments::{
    CheckoutOrchestrator, OperationKind, PayerDetails, PaymentError, PaymentGateway,
    PaymentNotification, PaymentReconciler, SignatureHeader, verify_signature,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub generator_connected: bool,
    pub gateway_configured: bool,
}

#[derive(Serialize)]
pub struct PlanSummary {
    pub id: &'static str,
    pub display_name: String,
    pub description: String,
    pub price: String,
    pub monthly_limit: MonthlyLimit,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub identification_number: Option<String>,
    pub plan: String,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub email: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct MentorshipRequest {
    pub email: String,
    pub challenge: String,
}

#[derive(Debug, Serialize)]
pub struct MentorshipResponse {
    pub entry: MentorshipEntry,
    pub quota: QuotaStatus,
}

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    pub id: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Error Mapping
// ============================================================================

fn core_error(err: MentorError) -> ApiError {
    let (status, code) = match &err {
        MentorError::UnknownPlan(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN"),
        MentorError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
        MentorError::AccountInactive(_) => (StatusCode::FORBIDDEN, "ACCOUNT_INACTIVE"),
        MentorError::EmailAlreadyRegistered(_) => {
            (StatusCode::CONFLICT, "EMAIL_ALREADY_REGISTERED")
        }
        MentorError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED"),
        MentorError::UpstreamUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "GENERATOR_UNAVAILABLE")
        }
        MentorError::MalformedUpstreamResponse(_) => {
            (StatusCode::BAD_GATEWAY, "GENERATOR_MALFORMED")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };

    // Quota exhaustion is an expected outcome, never a fault.
    if status.is_server_error() {
        tracing::error!(%err, "request failed");
    } else if !matches!(err, MentorError::QuotaExceeded { .. }) {
        tracing::warn!(%err, "request rejected");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

fn payment_error(err: PaymentError) -> ApiError {
    let (status, code) = match &err {
        PaymentError::UnknownPlan(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN"),
        PaymentError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, "INVALID_TRANSITION"),
        PaymentError::MalformedReference(_) => (StatusCode::BAD_REQUEST, "MALFORMED_REFERENCE"),
        PaymentError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
        PaymentError::Gateway(_) => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_ERROR"),
    };

    if status.is_server_error() {
        tracing::error!(%err, "payment request failed");
    } else {
        tracing::warn!(%err, "payment request rejected");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.user_message().to_string(),
            code: code.into(),
        }),
    )
}

fn require_gateway(state: &AppState) -> Result<Arc<dyn PaymentGateway>, ApiError> {
    state
        .gateway
        .as_ref()
        .map(|gateway| gateway.clone() as Arc<dyn PaymentGateway>)
        .ok_or_else(|| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Payments not configured".into(),
                    code: "PAYMENTS_DISABLED".into(),
                }),
            )
        })
}

fn resolve_active_account(state: &AppState, email: &str) -> Result<Account, ApiError> {
    let account = state
        .store
        .find_by_email(email)
        .map_err(core_error)?
        .ok_or_else(|| core_error(MentorError::AccountNotFound(email.to_string())))?;

    if !account.activated {
        return Err(core_error(MentorError::AccountInactive(email.to_string())));
    }
    Ok(account)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let generator_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        generator_connected,
        gateway_configured: state.gateway.is_some(),
    })
}

/// Plan catalog listing
pub async fn list_plans() -> Json<Vec<PlanSummary>> {
    let plans = Plan::all()
        .into_iter()
        .map(|plan| {
            let pricing = plan.pricing();
            PlanSummary {
                id: plan.as_str(),
                display_name: pricing.display_name,
                description: pricing.description,
                price: pricing.price.to_string(),
                monthly_limit: plan.monthly_limit(),
            }
        })
        .collect();

    Json(plans)
}

/// Begin a registration checkout.
///
/// Pre-registers an inactive account (or refreshes an abandoned one) and
/// returns the gateway's redirect URL. Activation only happens once the
/// webhook confirms the payment.
pub async fn register_checkout(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let gateway = require_gateway(&state)?;
    let plan = Plan::from_name(&payload.plan).map_err(core_error)?;

    let account = match state.store.find_by_email(&payload.email).map_err(core_error)? {
        Some(existing) if existing.activated => {
            return Err(core_error(MentorError::EmailAlreadyRegistered(
                payload.email,
            )));
        }
        Some(mut existing) => {
            // The previous checkout was abandoned; reuse the record.
            tracing::info!(email = %existing.email, "reusing inactive registration");
            existing.refresh_pre_registration(
                &payload.name,
                payload.identification_number.clone(),
                plan,
            );
            state.store.save(&existing).map_err(core_error)?;
            existing
        }
        None => {
            tracing::info!(email = %payload.email, "pre-registering inactive account");
            let account = Account::pre_register(
                &payload.name,
                &payload.email,
                payload.identification_number.clone(),
                plan,
                Utc::now(),
            );
            state.store.save(&account).map_err(core_error)?;
            account
        }
    };

    let payer = PayerDetails {
        name: account.name.clone(),
        email: account.email.clone(),
        identification_number: account.identification_number.clone(),
    };

    let orchestrator = CheckoutOrchestrator::new(gateway, state.base_url.clone());
    let session = orchestrator
        .begin_checkout(OperationKind::Registration, &payload.plan, &payer, None)
        .await
        .map_err(payment_error)?;

    Ok(Json(CheckoutResponse {
        checkout_url: session.init_point,
        session_id: session.id,
    }))
}

/// Begin an upgrade checkout for an active account
pub async fn upgrade_checkout(
    State(state): State<AppState>,
    Json(payload): Json<UpgradeRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let gateway = require_gateway(&state)?;
    let account = resolve_active_account(&state, &payload.email)?;

    let payer = PayerDetails {
        name: account.name.clone(),
        email: account.email.clone(),
        identification_number: account.identification_number.clone(),
    };

    let orchestrator = CheckoutOrchestrator::new(gateway, state.base_url.clone());
    let session = orchestrator
        .begin_checkout(
            OperationKind::Upgrade,
            &payload.plan,
            &payer,
            Some(account.plan),
        )
        .await
        .map_err(payment_error)?;

    Ok(Json(CheckoutResponse {
        checkout_url: session.init_point,
        session_id: session.id,
    }))
}

/// Payment gateway webhook.
///
/// Acknowledges with 200 whenever redelivery cannot change the outcome;
/// answers 5xx only for gateway-communication faults so the notifier
/// retries later.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WebhookParams>,
) -> Result<StatusCode, ApiError> {
    let gateway = require_gateway(&state)?;

    if let Some(secret) = &state.webhook_secret {
        check_webhook_signature(secret, &params, &headers)?;
    }

    let reconciler = PaymentReconciler::new(state.store.clone(), gateway, state.notifier.clone());
    let notification = PaymentNotification {
        id: params.id,
        topic: params.topic,
    };

    match reconciler.handle_notification(&notification).await {
        Ok(outcome) => {
            tracing::info!(?outcome, "webhook processed");
            Ok(StatusCode::OK)
        }
        Err(err) => {
            tracing::error!(%err, "webhook processing failed; requesting redelivery");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Webhook processing failed".into(),
                    code: "WEBHOOK_RETRY".into(),
                }),
            ))
        }
    }
}

fn check_webhook_signature(
    secret: &str,
    params: &WebhookParams,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let rejected = |code: &str| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid webhook signature".into(),
                code: code.into(),
            }),
        )
    };

    let header = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .and_then(SignatureHeader::parse)
        .ok_or_else(|| rejected("MISSING_SIGNATURE"))?;

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let resource_id = params.id.as_deref().unwrap_or_default();

    if !verify_signature(secret, resource_id, request_id, &header) {
        tracing::warn!(resource_id, "webhook signature verification failed");
        return Err(rejected("INVALID_SIGNATURE"));
    }
    Ok(())
}

/// Quota display for the plan-management view
pub async fn quota_status(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<QuotaStatus>, ApiError> {
    resolve_active_account(&state, &query.email)?;

    let status = state
        .store
        .refresh_quota(&query.email, Utc::now())
        .map_err(core_error)?;
    Ok(Json(status))
}

/// Generate a mentorship for a free-text challenge
pub async fn request_mentorship(
    State(state): State<AppState>,
    Json(payload): Json<MentorshipRequest>,
) -> Result<Json<MentorshipResponse>, ApiError> {
    let outcome = state
        .mentorship
        .request_mentorship(&payload.email, &payload.challenge, Utc::now())
        .await
        .map_err(core_error)?;

    Ok(Json(MentorshipResponse {
        entry: outcome.entry,
        quota: outcome.quota,
    }))
}

/// Mentorship history, newest first
pub async fn list_journal(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<MentorshipEntry>>, ApiError> {
    let account = resolve_active_account(&state, &query.email)?;
    let entries = state
        .journal
        .list_for_account(account.id)
        .map_err(core_error)?;
    Ok(Json(entries))
}

/// One journal entry, owner-checked
pub async fn get_journal_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<MentorshipEntry>, ApiError> {
    let account = resolve_active_account(&state, &query.email)?;

    state
        .journal
        .get(id, account.id)
        .map_err(core_error)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Mentorship entry not found".into(),
                    code: "ENTRY_NOT_FOUND".into(),
                }),
            )
        })
}

/// Delete one journal entry, owner-checked
pub async fn delete_journal_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EmailQuery>,
) -> Result<StatusCode, ApiError> {
    let account = resolve_active_account(&state, &query.email)?;

    if state.journal.delete(id, account.id).map_err(core_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Mentorship entry not found".into(),
                code: "ENTRY_NOT_FOUND".into(),
            }),
        ))
    }
}

/// Aggregated dashboard for the account's history
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let account = resolve_active_account(&state, &query.email)?;
    let entries = state
        .journal
        .list_for_account(account.id)
        .map_err(core_error)?;
    Ok(Json(DashboardSummary::build(&entries)))
}
