//! Payment Reconciliation
//!
//! Consumes gateway notifications and converges account state onto the
//! outcome of the authoritative payment record. Notifications may arrive
//! duplicated or out of order; the idempotent terminal-state checks here
//! are the only convergence mechanism; no sequence numbers are assumed.
//!
//! Acknowledgement contract: every unusable notification (wrong topic,
//! unapproved payment, malformed reference, unknown account, unknown
//! operation) is acknowledged so the notifier stops redelivering, because
//! redelivery cannot change the outcome. Only a gateway-communication
//! fault during the authoritative fetch surfaces as an error.

use std::sync::Arc;

use chrono::Utc;
use mentor_core::store::{AccountStore, ActivationOutcome};
use mentor_core::{MentorError, Plan};
use serde::Deserialize;

use crate::error::Result;
use crate::gateway::{PaymentGateway, PaymentStatus};
use crate::notify::WelcomeNotifier;
use crate::reference::{CheckoutReference, DecodedReference, OperationKind};

/// Inbound gateway notification (untrusted)
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentNotification {
    /// Resource id, a payment id for payment topics
    pub id: Option<String>,
    /// Notification category ("payment", "merchant_order", ...)
    pub topic: Option<String>,
}

/// Why an acknowledged notification could not be applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscardReason {
    MalformedReference,
    UnknownPlan,
    AccountNotFound,
    UnknownOperation,
}

/// Result of processing one notification.
///
/// Every variant acknowledges the delivery; a retryable error is returned
/// instead only when the authoritative fetch failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Non-payment topic or missing resource id
    Ignored,
    /// Authoritative status was not approved; nothing to apply
    NotApproved(PaymentStatus),
    Activated { email: String, plan: Plan },
    /// Duplicate registration delivery; state untouched
    AlreadyActive { email: String },
    UpgradeApplied { email: String, plan: Plan },
    /// Unusable notification, logged and acknowledged
    Discarded(DiscardReason),
}

/// The reconciliation state machine
pub struct PaymentReconciler<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn WelcomeNotifier>,
}

impl<S: AccountStore> PaymentReconciler<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn WelcomeNotifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }

    /// Process one inbound notification
    pub async fn handle_notification(
        &self,
        notification: &PaymentNotification,
    ) -> Result<ReconcileOutcome> {
        let (Some(id), Some(topic)) = (
            notification.id.as_deref(),
            notification.topic.as_deref(),
        ) else {
            tracing::info!(
                topic = ?notification.topic,
                id = ?notification.id,
                "ignoring notification without id or topic"
            );
            return Ok(ReconcileOutcome::Ignored);
        };

        if topic != "payment" {
            tracing::info!(%topic, %id, "ignoring non-payment notification");
            return Ok(ReconcileOutcome::Ignored);
        }

        // Never trust the payload; re-fetch the authoritative record.
        // A communication fault here is the only retryable outcome.
        let payment = self.gateway.fetch_payment(id).await?;

        if !payment.status.is_approved() {
            tracing::info!(%id, status = %payment.status, "payment not approved; nothing to apply");
            return Ok(ReconcileOutcome::NotApproved(payment.status));
        }

        let Some(reference) = payment.external_reference.as_deref() else {
            tracing::error!(%id, "approved payment carries no external reference");
            return Ok(ReconcileOutcome::Discarded(DiscardReason::MalformedReference));
        };

        let decoded = match CheckoutReference::decode(reference) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::error!(%id, %reference, %err, "malformed external reference");
                return Ok(ReconcileOutcome::Discarded(DiscardReason::MalformedReference));
            }
        };

        match decoded.kind() {
            Some(OperationKind::Registration) => self.apply_registration(&decoded).await,
            Some(OperationKind::Upgrade) => self.apply_upgrade(&decoded),
            None => {
                tracing::warn!(
                    kind = %decoded.kind,
                    %reference,
                    "unrecognized operation kind in reference"
                );
                Ok(ReconcileOutcome::Discarded(DiscardReason::UnknownOperation))
            }
        }
    }

    async fn apply_registration(&self, decoded: &DecodedReference) -> Result<ReconcileOutcome> {
        let Ok(plan) = decoded.plan() else {
            tracing::error!(plan = %decoded.plan, email = %decoded.email, "unknown plan in reference");
            return Ok(ReconcileOutcome::Discarded(DiscardReason::UnknownPlan));
        };

        match self.store.activate(&decoded.email, plan, Utc::now()) {
            Ok(ActivationOutcome::Activated(account)) => {
                tracing::info!(email = %account.email, %plan, "account activated");

                // Best effort: a failed send never undoes the activation.
                if let Err(err) = self.notifier.send_welcome(&account).await {
                    tracing::error!(email = %account.email, %err, "welcome notification failed");
                }

                Ok(ReconcileOutcome::Activated {
                    email: account.email,
                    plan,
                })
            }
            Ok(ActivationOutcome::AlreadyActive) => {
                tracing::warn!(
                    email = %decoded.email,
                    "registration notification for an already active account"
                );
                Ok(ReconcileOutcome::AlreadyActive {
                    email: decoded.email.clone(),
                })
            }
            Err(MentorError::AccountNotFound(_)) => {
                tracing::error!(email = %decoded.email, "no account to activate");
                Ok(ReconcileOutcome::Discarded(DiscardReason::AccountNotFound))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply_upgrade(&self, decoded: &DecodedReference) -> Result<ReconcileOutcome> {
        let Ok(plan) = decoded.plan() else {
            tracing::error!(plan = %decoded.plan, email = %decoded.email, "unknown plan in reference");
            return Ok(ReconcileOutcome::Discarded(DiscardReason::UnknownPlan));
        };

        match self.store.apply_upgrade(&decoded.email, plan, Utc::now()) {
            Ok(account) => {
                tracing::info!(email = %account.email, %plan, "plan upgrade applied");
                Ok(ReconcileOutcome::UpgradeApplied {
                    email: account.email,
                    plan,
                })
            }
            Err(MentorError::AccountNotFound(_)) => {
                tracing::error!(email = %decoded.email, "no account to upgrade");
                Ok(ReconcileOutcome::Discarded(DiscardReason::AccountNotFound))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use mentor_core::{Account, MemoryAccountStore};

    use super::*;
    use crate::error::PaymentError;
    use crate::gateway::{CheckoutSession, PaymentRecord, PreferenceRequest};

    /// Serves canned payment records; fails when marked unreachable
    #[derive(Default)]
    struct StubGateway {
        payments: Mutex<HashMap<String, PaymentRecord>>,
        unreachable: bool,
    }

    impl StubGateway {
        fn with_payment(id: &str, status: PaymentStatus, reference: Option<&str>) -> Self {
            let gateway = Self::default();
            gateway.payments.lock().unwrap().insert(
                id.to_string(),
                PaymentRecord {
                    id: id.to_string(),
                    status,
                    external_reference: reference.map(str::to_string),
                },
            );
            gateway
        }

        fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_preference(&self, _request: &PreferenceRequest) -> Result<CheckoutSession> {
            unimplemented!("not used by reconciliation tests")
        }

        async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord> {
            if self.unreachable {
                return Err(PaymentError::Gateway("connect timeout".into()));
            }
            self.payments
                .lock()
                .unwrap()
                .get(payment_id)
                .cloned()
                .ok_or_else(|| PaymentError::Gateway(format!("payment {payment_id} not found")))
        }
    }

    /// Counts welcome sends; optionally fails every one of them
    #[derive(Default)]
    struct CountingNotifier {
        sends: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl WelcomeNotifier for CountingNotifier {
        async fn send_welcome(&self, _account: &Account) -> Result<()> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::Config("smtp relay down".into()));
            }
            Ok(())
        }
    }

    fn notification(id: &str, topic: &str) -> PaymentNotification {
        PaymentNotification {
            id: Some(id.into()),
            topic: Some(topic.into()),
        }
    }

    fn store_with_account(activated: bool) -> Arc<MemoryAccountStore> {
        let store = Arc::new(MemoryAccountStore::new());
        let mut account = Account::pre_register(
            "Ana Lima",
            "ana@example.com",
            None,
            mentor_core::Plan::Semente,
            Utc::now(),
        );
        account.activated = activated;
        account.monthly_usage_count = 6;
        store.save(&account).unwrap();
        store
    }

    fn reconciler(
        store: Arc<MemoryAccountStore>,
        gateway: StubGateway,
        notifier: CountingNotifier,
    ) -> (
        PaymentReconciler<MemoryAccountStore>,
        Arc<CountingNotifier>,
    ) {
        let notifier = Arc::new(notifier);
        let reconciler = PaymentReconciler::new(store, Arc::new(gateway), notifier.clone());
        (reconciler, notifier)
    }

    #[tokio::test]
    async fn test_non_payment_topics_are_ignored() {
        let (reconciler, _) = reconciler(
            store_with_account(false),
            StubGateway::default(),
            CountingNotifier::default(),
        );

        let outcome = reconciler
            .handle_notification(&notification("42", "merchant_order"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);

        let outcome = reconciler
            .handle_notification(&PaymentNotification::default())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_unapproved_payment_mutates_nothing() {
        let store = store_with_account(false);
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Rejected,
            Some("REG-SEMENTE-ana@example.com-abc"),
        );
        let (reconciler, notifier) =
            reconciler(store.clone(), gateway, CountingNotifier::default());

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::NotApproved(PaymentStatus::Rejected));
        assert!(!store.find_by_email("ana@example.com").unwrap().unwrap().activated);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gateway_fault_is_the_only_retryable_outcome() {
        let (reconciler, _) = reconciler(
            store_with_account(false),
            StubGateway::unreachable(),
            CountingNotifier::default(),
        );

        let err = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_registration_activates_and_welcomes() {
        let store = store_with_account(false);
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("REG-COLHEITA-ana@example.com-abc"),
        );
        let (reconciler, notifier) =
            reconciler(store.clone(), gateway, CountingNotifier::default());

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Activated {
                email: "ana@example.com".into(),
                plan: mentor_core::Plan::Colheita,
            }
        );

        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert!(account.activated);
        assert_eq!(account.plan, mentor_core::Plan::Colheita);
        assert_eq!(account.monthly_usage_count, 0);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_delivery_is_idempotent() {
        let store = store_with_account(false);
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("REG-SEMENTE-ana@example.com-abc"),
        );
        let (reconciler, notifier) =
            reconciler(store.clone(), gateway, CountingNotifier::default());

        let first = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();
        assert!(matches!(first, ReconcileOutcome::Activated { .. }));

        let snapshot = store.find_by_email("ana@example.com").unwrap().unwrap();

        let second = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();
        assert_eq!(
            second,
            ReconcileOutcome::AlreadyActive {
                email: "ana@example.com".into()
            }
        );

        // Exactly one activation, one welcome, no double window reset.
        let unchanged = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(unchanged, snapshot);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_welcome_failure_never_undoes_the_activation() {
        let store = store_with_account(false);
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("REG-SEMENTE-ana@example.com-abc"),
        );
        let failing = CountingNotifier {
            fail: true,
            ..CountingNotifier::default()
        };
        let (reconciler, _) = reconciler(store.clone(), gateway, failing);

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Activated { .. }));
        assert!(store.find_by_email("ana@example.com").unwrap().unwrap().activated);
    }

    #[tokio::test]
    async fn test_upgrade_resets_the_usage_window() {
        let store = store_with_account(true);
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("UPG-COLHEITA-ana@example.com-abc"),
        );
        let (reconciler, notifier) =
            reconciler(store.clone(), gateway, CountingNotifier::default());

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::UpgradeApplied {
                email: "ana@example.com".into(),
                plan: mentor_core::Plan::Colheita,
            }
        );

        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(account.plan, mentor_core::Plan::Colheita);
        assert_eq!(account.monthly_usage_count, 0);
        // Upgrades do not trigger the welcome notification.
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_reference_is_acknowledged() {
        let gateway =
            StubGateway::with_payment("42", PaymentStatus::Approved, Some("REG-SEMENTE"));
        let (reconciler, _) = reconciler(
            store_with_account(false),
            gateway,
            CountingNotifier::default(),
        );

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::MalformedReference)
        );
    }

    #[tokio::test]
    async fn test_missing_reference_is_acknowledged() {
        let gateway = StubGateway::with_payment("42", PaymentStatus::Approved, None);
        let (reconciler, _) = reconciler(
            store_with_account(false),
            gateway,
            CountingNotifier::default(),
        );

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::MalformedReference)
        );
    }

    #[tokio::test]
    async fn test_unknown_account_is_acknowledged() {
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("REG-SEMENTE-ghost@example.com-abc"),
        );
        let (reconciler, _) = reconciler(
            store_with_account(false),
            gateway,
            CountingNotifier::default(),
        );

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::AccountNotFound)
        );
    }

    #[tokio::test]
    async fn test_unknown_operation_kind_is_acknowledged() {
        let gateway = StubGateway::with_payment(
            "42",
            PaymentStatus::Approved,
            Some("REFUND-SEMENTE-ana@example.com-abc"),
        );
        let store = store_with_account(false);
        let (reconciler, _) = reconciler(store.clone(), gateway, CountingNotifier::default());

        let outcome = reconciler
            .handle_notification(&notification("42", "payment"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::UnknownOperation)
        );
        assert!(!store.find_by_email("ana@example.com").unwrap().unwrap().activated);
    }

    #[tokio::test]
    async fn test_late_duplicate_registration_never_clobbers_an_upgrade() {
        // Registration applies, an upgrade follows, then the notifier
        // redelivers the old registration. The terminal state must keep
        // the upgraded plan.
        let store = store_with_account(false);
        let gateway = StubGateway::with_payment(
            "1",
            PaymentStatus::Approved,
            Some("REG-SEMENTE-ana@example.com-n1"),
        );
        gateway.payments.lock().unwrap().insert(
            "2".into(),
            PaymentRecord {
                id: "2".into(),
                status: PaymentStatus::Approved,
                external_reference: Some("UPG-JARDINEIRO-ana@example.com-n2".into()),
            },
        );
        let (reconciler, _) = reconciler(store.clone(), gateway, CountingNotifier::default());

        reconciler
            .handle_notification(&notification("1", "payment"))
            .await
            .unwrap();
        reconciler
            .handle_notification(&notification("2", "payment"))
            .await
            .unwrap();
        let replay = reconciler
            .handle_notification(&notification("1", "payment"))
            .await
            .unwrap();

        assert!(matches!(replay, ReconcileOutcome::AlreadyActive { .. }));
        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert!(account.activated);
        assert_eq!(account.plan, mentor_core::Plan::Jardineiro);
    }
}
