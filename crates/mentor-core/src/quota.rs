//! Quota Tracking
//!
//! Pure logic for the monthly usage window. Persistent mutation happens
//! through [`crate::store::AccountStore`]; these methods operate on an
//! `Account` value inside the store's critical section.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::plan::{MonthlyLimit, Plan};

impl Account {
    /// Reset the counter when the calendar month has changed.
    ///
    /// Compares calendar identity (year + month) only, not a rolling 30-day
    /// window: usage on Jan 31 and Feb 1 lands in different windows.
    /// Idempotent within a month. Returns true when a reset happened.
    pub fn rollover_if_new_month(&mut self, now: DateTime<Utc>) -> bool {
        let window = self.last_usage_window_start;
        if window.year() != now.year() || window.month() != now.month() {
            self.monthly_usage_count = 0;
            self.last_usage_window_start = now;
            return true;
        }
        false
    }

    /// Whether the plan allowance admits one more mentorship
    pub fn is_within_limit(&self) -> bool {
        self.plan.monthly_limit().allows(self.monthly_usage_count)
    }

    /// Percentage of the monthly allowance consumed, capped at 100.
    /// Unlimited plans always report 0.
    pub fn usage_percentage(&self) -> u8 {
        match self.plan.monthly_limit() {
            MonthlyLimit::Unlimited => 0,
            MonthlyLimit::Limited(0) => 0,
            MonthlyLimit::Limited(limit) => {
                let pct = u64::from(self.monthly_usage_count) * 100 / u64::from(limit);
                pct.min(100) as u8
            }
        }
    }

    /// Count one consumed mentorship. Only ever invoked through the store's
    /// atomic grant, after a successful generation.
    pub(crate) fn record_usage(&mut self) {
        self.monthly_usage_count += 1;
    }

    /// Snapshot of the quota display contract
    pub fn quota_status(&self) -> QuotaStatus {
        QuotaStatus {
            plan: self.plan,
            plan_name: self.plan.pricing().display_name,
            used: self.monthly_usage_count,
            limit: self.plan.monthly_limit(),
            percentage: self.usage_percentage(),
        }
    }
}

/// Quota display contract consumed by the UI boundary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub plan: Plan,
    pub plan_name: String,
    pub used: u32,
    pub limit: MonthlyLimit,
    pub percentage: u8,
}
