//! Checkout Orchestration
//!
//! Turns a plan selection into a hosted checkout session, tagged with a
//! reference token the reconciler can decode once the gateway confirms
//! the payment.

use std::sync::Arc;

use mentor_core::{MonthlyLimit, Plan};

use crate::error::{PaymentError, Result};
use crate::gateway::{BackUrls, CheckoutSession, PayerDetails, PaymentGateway, PreferenceRequest};
use crate::reference::{CheckoutReference, OperationKind};

/// Builds checkout sessions for registrations and plan upgrades
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    /// Public base URL the gateway redirects back to
    base_url: String,
}

impl CheckoutOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into(),
        }
    }

    /// Begin a checkout for a new registration or a plan upgrade.
    ///
    /// `current_plan` is required for upgrades; the target plan must carry
    /// a strictly larger monthly allowance or the attempt is rejected with
    /// `InvalidTransition` before the gateway is ever contacted.
    pub async fn begin_checkout(
        &self,
        kind: OperationKind,
        plan_name: &str,
        payer: &PayerDetails,
        current_plan: Option<Plan>,
    ) -> Result<CheckoutSession> {
        let plan = Plan::from_name(plan_name)?;

        if kind == OperationKind::Upgrade {
            let current = current_plan.ok_or_else(|| {
                PaymentError::Config("upgrade checkout requires the current plan".into())
            })?;
            if !is_strict_upgrade(current, plan) {
                return Err(PaymentError::InvalidTransition {
                    from: current,
                    to: plan,
                });
            }
        }

        let reference = CheckoutReference::new(kind, plan, payer.email.clone());
        let pricing = plan.pricing();

        // Failed registrations return to the checkout form; failed
        // upgrades return to the plan-management view.
        let failure = match kind {
            OperationKind::Registration => format!("{}/checkout/cancel", self.base_url),
            OperationKind::Upgrade => format!("{}/upgrade/cancel", self.base_url),
        };

        let request = PreferenceRequest {
            title: pricing.description,
            price: pricing.price,
            payer: payer.clone(),
            external_reference: reference.encode(),
            back_urls: BackUrls {
                success: format!("{}/checkout/processing", self.base_url),
                pending: format!("{}/checkout/processing", self.base_url),
                failure,
            },
            notification_url: format!("{}/webhook/mercadopago", self.base_url),
        };

        let session = self.gateway.create_preference(&request).await?;

        tracing::info!(
            kind = %kind,
            plan = %plan,
            email = %payer.email,
            session = %session.id,
            "checkout session created"
        );

        Ok(session)
    }
}

/// A plan change counts as an upgrade only when the target's monthly
/// allowance is strictly larger.
fn is_strict_upgrade(current: Plan, target: Plan) -> bool {
    match (current.monthly_limit(), target.monthly_limit()) {
        (MonthlyLimit::Limited(from), MonthlyLimit::Limited(to)) => to > from,
        (MonthlyLimit::Limited(_), MonthlyLimit::Unlimited) => true,
        (MonthlyLimit::Unlimited, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::gateway::PaymentRecord;

    /// Records the last preference request instead of calling out
    #[derive(Default)]
    struct RecordingGateway {
        last_request: Mutex<Option<PreferenceRequest>>,
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn create_preference(&self, request: &PreferenceRequest) -> Result<CheckoutSession> {
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(CheckoutSession {
                id: "pref_123".into(),
                init_point: "https://gateway.example.com/init/pref_123".into(),
            })
        }

        async fn fetch_payment(&self, _payment_id: &str) -> Result<PaymentRecord> {
            unimplemented!("not used by checkout tests")
        }
    }

    fn payer() -> PayerDetails {
        PayerDetails {
            name: "Ana Lima".into(),
            email: "ana@example.com".into(),
            identification_number: Some("12345678901".into()),
        }
    }

    fn orchestrator() -> (CheckoutOrchestrator, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::default());
        let orchestrator =
            CheckoutOrchestrator::new(gateway.clone(), "https://app.example.com");
        (orchestrator, gateway)
    }

    #[tokio::test]
    async fn test_registration_checkout_carries_a_decodable_reference() {
        let (orchestrator, gateway) = orchestrator();

        let session = orchestrator
            .begin_checkout(OperationKind::Registration, "semente", &payer(), None)
            .await
            .unwrap();
        assert_eq!(session.init_point, "https://gateway.example.com/init/pref_123");

        let request = gateway.last_request.lock().unwrap().clone().unwrap();
        let decoded = CheckoutReference::decode(&request.external_reference).unwrap();
        assert_eq!(decoded.kind(), Some(OperationKind::Registration));
        assert_eq!(decoded.plan().unwrap(), Plan::Semente);
        assert_eq!(decoded.email, "ana@example.com");
        assert_eq!(request.notification_url, "https://app.example.com/webhook/mercadopago");
    }

    #[tokio::test]
    async fn test_failure_url_depends_on_operation_kind() {
        let (orchestrator, gateway) = orchestrator();

        orchestrator
            .begin_checkout(OperationKind::Registration, "semente", &payer(), None)
            .await
            .unwrap();
        let registration = gateway.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            registration.back_urls.failure,
            "https://app.example.com/checkout/cancel"
        );

        orchestrator
            .begin_checkout(
                OperationKind::Upgrade,
                "colheita",
                &payer(),
                Some(Plan::Semente),
            )
            .await
            .unwrap();
        let upgrade = gateway.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            upgrade.back_urls.failure,
            "https://app.example.com/upgrade/cancel"
        );
    }

    #[tokio::test]
    async fn test_unknown_plan_is_rejected() {
        let (orchestrator, gateway) = orchestrator();

        let err = orchestrator
            .begin_checkout(OperationKind::Registration, "platinum", &payer(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::UnknownPlan(_)));
        assert!(gateway.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_downgrade_and_lateral_moves_are_rejected() {
        let (orchestrator, gateway) = orchestrator();

        for (current, target) in [
            (Plan::Colheita, "semente"),
            (Plan::Colheita, "colheita"),
            (Plan::Jardineiro, "colheita"),
            (Plan::Jardineiro, "jardineiro"),
        ] {
            let err = orchestrator
                .begin_checkout(OperationKind::Upgrade, target, &payer(), Some(current))
                .await
                .unwrap_err();
            assert!(
                matches!(err, PaymentError::InvalidTransition { .. }),
                "{current:?} -> {target}"
            );
        }

        // The gateway was never contacted for any rejected transition.
        assert!(gateway.last_request.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upgrade_to_unlimited_is_allowed() {
        let (orchestrator, _) = orchestrator();

        let session = orchestrator
            .begin_checkout(
                OperationKind::Upgrade,
                "jardineiro",
                &payer(),
                Some(Plan::Colheita),
            )
            .await;
        assert!(session.is_ok());
    }

    #[test]
    fn test_strict_upgrade_ordering() {
        assert!(is_strict_upgrade(Plan::Semente, Plan::Colheita));
        assert!(is_strict_upgrade(Plan::Semente, Plan::Jardineiro));
        assert!(!is_strict_upgrade(Plan::Colheita, Plan::Colheita));
        assert!(!is_strict_upgrade(Plan::Jardineiro, Plan::Semente));
    }
}
