//! Mentorship Service
//!
//! Sequences a generation request behind the quota contract: rollover and
//! an advisory limit check first, then generation, then the store's atomic
//! usage grant. The counter is only incremented after a successful
//! generation and can never pass the plan limit, however many requests run
//! concurrently.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{MentorError, Result};
use crate::journal::{MentorshipEntry, MentorshipJournal};
use crate::plan::MonthlyLimit;
use crate::provider::MentorProvider;
use crate::quota::QuotaStatus;
use crate::store::{AccountStore, UsageDecision};

/// A granted mentorship together with the refreshed quota
#[derive(Clone, Debug)]
pub struct MentorshipOutcome {
    pub entry: MentorshipEntry,
    pub quota: QuotaStatus,
}

/// Orchestrates account resolution, quota enforcement, generation and
/// journaling for one user action.
pub struct MentorshipService<S, J> {
    store: Arc<S>,
    journal: Arc<J>,
    provider: Arc<dyn MentorProvider>,
}

impl<S: AccountStore, J: MentorshipJournal> MentorshipService<S, J> {
    pub fn new(store: Arc<S>, journal: Arc<J>, provider: Arc<dyn MentorProvider>) -> Self {
        Self {
            store,
            journal,
            provider,
        }
    }

    pub async fn request_mentorship(
        &self,
        email: &str,
        challenge: &str,
        now: DateTime<Utc>,
    ) -> Result<MentorshipOutcome> {
        let account = self
            .store
            .find_by_email(email)?
            .ok_or_else(|| MentorError::AccountNotFound(email.to_string()))?;

        if !account.activated {
            return Err(MentorError::AccountInactive(email.to_string()));
        }

        // Advisory check so an exhausted account never reaches the
        // generator; the authoritative gate is the atomic grant below.
        let status = self.store.refresh_quota(email, now)?;
        if let MonthlyLimit::Limited(limit) = status.limit {
            if status.used >= limit {
                return Err(MentorError::QuotaExceeded {
                    used: status.used,
                    limit,
                });
            }
        }

        let record = self.provider.generate(challenge).await?;

        let quota = match self.store.try_record_usage(email, now)? {
            UsageDecision::Granted(status) => status,
            UsageDecision::Exhausted { used, limit } => {
                // Lost the race to a concurrent request; the generated
                // record is discarded rather than exceeding the limit.
                return Err(MentorError::QuotaExceeded { used, limit });
            }
        };

        let entry = MentorshipEntry::new(account.id, challenge, record, now);
        self.journal.save(&entry)?;

        tracing::info!(
            email = %account.email,
            theme = %entry.record.identified_theme,
            used = quota.used,
            "mentorship generated"
        );

        Ok(MentorshipOutcome { entry, quota })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::account::Account;
    use crate::journal::MemoryJournal;
    use crate::plan::Plan;
    use crate::provider::MentorshipRecord;
    use crate::store::MemoryAccountStore;

    struct StaticProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StaticProvider {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl MentorProvider for StaticProvider {
        async fn generate(&self, _challenge: &str) -> Result<MentorshipRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MentorError::UpstreamUnavailable("connection refused".into()));
            }
            Ok(MentorshipRecord {
                identified_theme: "Anxiety".into(),
                anchor_passage: "Philippians 4:6-7".into(),
                applied_reflection: "Bring it to prayer.".into(),
                practical_steps: "1. Pray\n2. Write\n3. Rest".into(),
                cross_references: "Matthew 6:34".into(),
                closing_prayer: "Lord, grant us peace.".into(),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn service_with(
        plan: Plan,
        used: u32,
        activated: bool,
        provider: StaticProvider,
    ) -> (
        MentorshipService<MemoryAccountStore, MemoryJournal>,
        Arc<MemoryAccountStore>,
        Arc<StaticProvider>,
    ) {
        let store = Arc::new(MemoryAccountStore::new());
        let journal = Arc::new(MemoryJournal::new());
        let provider = Arc::new(provider);

        let mut account =
            Account::pre_register("Ana", "ana@example.com", None, plan, Utc::now());
        account.activated = activated;
        account.monthly_usage_count = used;
        store.save(&account).unwrap();

        let service = MentorshipService::new(store.clone(), journal, provider.clone());
        (service, store, provider)
    }

    #[tokio::test]
    async fn test_success_increments_and_journals() {
        let (service, store, _) = service_with(Plan::Semente, 4, true, StaticProvider::ok());

        let outcome = service
            .request_mentorship("ana@example.com", "I feel anxious", Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.quota.used, 5);
        assert_eq!(outcome.entry.record.identified_theme, "Anxiety");

        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(account.monthly_usage_count, 5);
    }

    #[tokio::test]
    async fn test_exhausted_quota_never_reaches_the_generator() {
        let (service, store, provider) =
            service_with(Plan::Semente, 10, true, StaticProvider::ok());

        let err = service
            .request_mentorship("ana@example.com", "challenge", Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, MentorError::QuotaExceeded { used: 10, limit: 10 }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(account.monthly_usage_count, 10);
    }

    #[tokio::test]
    async fn test_generator_failure_leaves_the_counter_alone() {
        let (service, store, _) = service_with(Plan::Semente, 4, true, StaticProvider::failing());

        let err = service
            .request_mentorship("ana@example.com", "challenge", Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, MentorError::UpstreamUnavailable(_)));
        let account = store.find_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(account.monthly_usage_count, 4);
    }

    #[tokio::test]
    async fn test_last_slot_then_rejection() {
        let (service, _, _) = service_with(Plan::Semente, 9, true, StaticProvider::ok());

        let outcome = service
            .request_mentorship("ana@example.com", "challenge", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.quota.used, 10);

        let err = service
            .request_mentorship("ana@example.com", "challenge", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_inactive_account_is_rejected() {
        let (service, _, provider) = service_with(Plan::Semente, 0, false, StaticProvider::ok());

        let err = service
            .request_mentorship("ana@example.com", "challenge", Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, MentorError::AccountInactive(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let (service, _, _) = service_with(Plan::Semente, 0, true, StaticProvider::ok());

        let err = service
            .request_mentorship("ghost@example.com", "challenge", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::AccountNotFound(_)));
    }
}
