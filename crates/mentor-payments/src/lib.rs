//! # mentor-payments
//!
//! Checkout orchestration and payment reconciliation for faith-mentor.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐      ┌──────────────────┐      ┌─────────────┐
//! │  Checkout   │─────▶│  Gateway-hosted  │─────▶│  Webhook    │
//! │ Orchestrator│      │  checkout page   │      │ notification│
//! └─────────────┘      └──────────────────┘      └──────┬──────┘
//!        │ tags the session with a                       │
//!        │ reference token:                              ▼
//!        │ KIND-PLAN-email-nonce              ┌──────────────────┐
//!        │                                    │    Payment       │
//!        └───────────────────────────────────▶│   Reconciler     │
//!                          decoded by         └────────┬─────────┘
//!                                                      │ re-fetches the
//!                                                      │ authoritative
//!                                                      ▼ record, then
//!                                             ┌──────────────────┐
//!                                             │   AccountStore   │
//!                                             │ activate/upgrade │
//!                                             └──────────────────┘
//! ```
//!
//! Notifications may arrive duplicated or out of order; the reconciler's
//! idempotent terminal-state checks are the only convergence mechanism.
//! A notification is acknowledged in every case except a gateway
//! communication fault, the one condition where redelivery can change the
//! outcome.

mod checkout;
mod error;
mod gateway;
mod notify;
mod reconcile;
mod reference;
mod signature;

pub use checkout::CheckoutOrchestrator;
pub use error::{PaymentError, Result};
pub use gateway::{
    BackUrls, CheckoutSession, MercadoPagoClient, MercadoPagoConfig, PayerDetails,
    PaymentGateway, PaymentRecord, PaymentStatus, PreferenceRequest,
};
pub use notify::{LogNotifier, WelcomeNotifier};
pub use reconcile::{DiscardReason, PaymentNotification, PaymentReconciler, ReconcileOutcome};
pub use reference::{CheckoutReference, DecodedReference, OperationKind};
pub use signature::{SignatureHeader, verify_signature};
