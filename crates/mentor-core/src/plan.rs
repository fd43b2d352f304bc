//! Subscription Plan Catalog
//!
//! Static table of plan tiers. Each plan maps to a monthly mentorship
//! allowance and a price; the top tier is unlimited.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{MentorError, Result};

/// Subscription plan tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Semente,
    Colheita,
    Jardineiro,
}

/// Monthly mentorship allowance for a plan.
///
/// "Unlimited" is its own variant, never a sentinel integer that could be
/// summed or compared arithmetically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthlyLimit {
    Limited(u32),
    Unlimited,
}

impl MonthlyLimit {
    /// Whether another mentorship fits under this allowance
    pub fn allows(&self, used: u32) -> bool {
        match self {
            MonthlyLimit::Limited(limit) => used < *limit,
            MonthlyLimit::Unlimited => true,
        }
    }
}

/// Pricing information (prices in BRL)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanPricing {
    pub display_name: String,
    pub description: String,
    pub price: Decimal,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Semente => "semente",
            Plan::Colheita => "colheita",
            Plan::Jardineiro => "jardineiro",
        }
    }

    /// Look up a plan by name, case-insensitive
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "semente" => Ok(Plan::Semente),
            "colheita" => Ok(Plan::Colheita),
            "jardineiro" => Ok(Plan::Jardineiro),
            _ => Err(MentorError::UnknownPlan(name.to_string())),
        }
    }

    /// Mentorships included per calendar month
    pub fn monthly_limit(&self) -> MonthlyLimit {
        match self {
            Plan::Semente => MonthlyLimit::Limited(10),
            Plan::Colheita => MonthlyLimit::Limited(30),
            Plan::Jardineiro => MonthlyLimit::Unlimited,
        }
    }

    /// Get pricing for this plan
    pub fn pricing(&self) -> PlanPricing {
        match self {
            Plan::Semente => PlanPricing {
                display_name: "Plano Semente".into(),
                description: "Plano Semente - 10 Mentorias/Mês".into(),
                price: dec!(1.00),
            },
            Plan::Colheita => PlanPricing {
                display_name: "Plano Colheita".into(),
                description: "Plano Colheita - 30 Mentorias/Mês".into(),
                price: dec!(49.90),
            },
            Plan::Jardineiro => PlanPricing {
                display_name: "Plano Jardineiro".into(),
                description: "Plano Jardineiro - Ilimitado".into(),
                price: dec!(99.90),
            },
        }
    }

    /// All catalog entries, cheapest first
    pub fn all() -> [Plan; 3] {
        [Plan::Semente, Plan::Colheita, Plan::Jardineiro]
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Plan::from_name("SEMENTE").unwrap(), Plan::Semente);
        assert_eq!(Plan::from_name("Colheita").unwrap(), Plan::Colheita);
        assert_eq!(Plan::from_name("jardineiro").unwrap(), Plan::Jardineiro);
    }

    #[test]
    fn test_unknown_plan_is_rejected() {
        let err = Plan::from_name("platinum").unwrap_err();
        assert!(matches!(err, MentorError::UnknownPlan(name) if name == "platinum"));
    }

    #[test]
    fn test_unlimited_is_a_sentinel_variant() {
        assert_eq!(Plan::Jardineiro.monthly_limit(), MonthlyLimit::Unlimited);
        assert!(Plan::Jardineiro.monthly_limit().allows(u32::MAX));
    }

    #[test]
    fn test_limited_allowance() {
        let limit = Plan::Semente.monthly_limit();
        assert!(limit.allows(9));
        assert!(!limit.allows(10));
        assert!(!limit.allows(11));
    }

    #[test]
    fn test_pricing() {
        assert_eq!(Plan::Colheita.pricing().price, dec!(49.90));
        assert_eq!(Plan::Jardineiro.pricing().display_name, "Plano Jardineiro");
    }
}
