//! Account Store
//!
//! Single source of truth for account state. Every transition runs inside
//! one critical section so a quota grant can never interleave with a
//! rollover or a plan upgrade on the same account.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::account::Account;
use crate::error::{MentorError, Result};
use crate::plan::{MonthlyLimit, Plan};
use crate::quota::QuotaStatus;

/// Outcome of an atomic usage grant
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsageDecision {
    /// Counter incremented; still within the plan allowance
    Granted(QuotaStatus),
    /// Finite limit already reached; counter untouched
    Exhausted { used: u32, limit: u32 },
}

/// Outcome of an activation transition
#[derive(Clone, Debug, PartialEq)]
pub enum ActivationOutcome {
    /// Account flipped to active; snapshot taken for the welcome notification
    Activated(Account),
    /// Duplicate delivery; no state changed
    AlreadyActive,
}

/// Storage contract for account state.
///
/// All mutation goes through these operations; the atomic transitions are
/// the mechanism that keeps concurrent generation requests from pushing the
/// usage counter past the plan limit.
pub trait AccountStore: Send + Sync {
    /// Save or replace an account record
    fn save(&self, account: &Account) -> Result<()>;

    /// Look up an account by email (case-insensitive)
    fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    fn exists_by_email(&self, email: &str) -> Result<bool>;

    /// Roll the usage window over if the calendar month changed, persist,
    /// and return the refreshed quota status.
    fn refresh_quota(&self, email: &str, now: DateTime<Utc>) -> Result<QuotaStatus>;

    /// Atomic conditional increment: rollover, then `count += 1` only if
    /// the plan allowance still admits it, all in one operation.
    fn try_record_usage(&self, email: &str, now: DateTime<Utc>) -> Result<UsageDecision>;

    /// Activation transition driven by a confirmed registration payment.
    /// Re-entry on an already-active account is a no-op.
    fn activate(&self, email: &str, plan: Plan, now: DateTime<Utc>) -> Result<ActivationOutcome>;

    /// Upgrade transition driven by a confirmed upgrade payment: sets the
    /// plan and resets the usage window unconditionally.
    fn apply_upgrade(&self, email: &str, plan: Plan, now: DateTime<Utc>) -> Result<Account>;
}

/// In-memory account store (for development and tests)
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    fn key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Run a mutation against one account under the write lock
    fn with_account<T>(
        &self,
        email: &str,
        f: impl FnOnce(&mut Account) -> Result<T>,
    ) -> Result<T> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(&Self::key(email))
            .ok_or_else(|| MentorError::AccountNotFound(email.to_string()))?;
        f(account)
    }
}

impl AccountStore for MemoryAccountStore {
    fn save(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap();
        accounts.insert(Self::key(&account.email), account.clone());
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(&Self::key(email)).cloned())
    }

    fn exists_by_email(&self, email: &str) -> Result<bool> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.contains_key(&Self::key(email)))
    }

    fn refresh_quota(&self, email: &str, now: DateTime<Utc>) -> Result<QuotaStatus> {
        self.with_account(email, |account| {
            account.rollover_if_new_month(now);
            Ok(account.quota_status())
        })
    }

    fn try_record_usage(&self, email: &str, now: DateTime<Utc>) -> Result<UsageDecision> {
        self.with_account(email, |account| {
            if !account.activated {
                return Err(MentorError::AccountInactive(account.email.clone()));
            }

            account.rollover_if_new_month(now);

            match account.plan.monthly_limit() {
                MonthlyLimit::Limited(limit) if account.monthly_usage_count >= limit => {
                    Ok(UsageDecision::Exhausted {
                        used: account.monthly_usage_count,
                        limit,
                    })
                }
                _ => {
                    account.record_usage();
                    Ok(UsageDecision::Granted(account.quota_status()))
                }
            }
        })
    }

    fn activate(&self, email: &str, plan: Plan, now: DateTime<Utc>) -> Result<ActivationOutcome> {
        self.with_account(email, |account| {
            if account.activated {
                return Ok(ActivationOutcome::AlreadyActive);
            }

            account.activated = true;
            account.plan = plan;
            account.monthly_usage_count = 0;
            account.last_usage_window_start = now;
            Ok(ActivationOutcome::Activated(account.clone()))
        })
    }

    fn apply_upgrade(&self, email: &str, plan: Plan, now: DateTime<Utc>) -> Result<Account> {
        self.with_account(email, |account| {
            account.plan = plan;
            account.monthly_usage_count = 0;
            account.last_usage_window_start = now;
            Ok(account.clone())
        })
    }
}
