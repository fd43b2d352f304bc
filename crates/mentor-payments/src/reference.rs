//! Checkout Reference Token
//!
//! Correlates an external payment back to the internal transition that
//! requested it. Encodes {operation kind, plan, email, nonce} into the
//! gateway's opaque external-reference string: `KIND-PLAN-email-nonce`.
//! The nonce uses the hyphen-free uuid format so only the email can carry
//! extra separators.

use mentor_core::Plan;
use uuid::Uuid;

use crate::error::{PaymentError, Result};

/// What the payment, once approved, should do to the account
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Registration,
    Upgrade,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Registration => "REG",
            OperationKind::Upgrade => "UPG",
        }
    }

    /// Parse a kind tag; None for anything unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "REG" => Some(OperationKind::Registration),
            "UPG" => Some(OperationKind::Upgrade),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference token ready to be encoded into a checkout request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutReference {
    pub kind: OperationKind,
    pub plan: Plan,
    pub email: String,
    /// Idempotency nonce, unique per checkout attempt
    pub nonce: String,
}

impl CheckoutReference {
    /// Build a fresh reference with a new idempotency nonce
    pub fn new(kind: OperationKind, plan: Plan, email: impl Into<String>) -> Self {
        Self {
            kind,
            plan,
            email: email.into(),
            nonce: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.kind.as_str(),
            self.plan.as_str().to_uppercase(),
            self.email,
            self.nonce
        )
    }

    /// Decode an external reference back into its four fields.
    ///
    /// Kind and plan sit at the front, the nonce at the back; any middle
    /// segments are rejoined as the email, so addresses containing `-`
    /// survive the round trip. Fewer than four segments is malformed.
    pub fn decode(reference: &str) -> Result<DecodedReference> {
        let parts: Vec<&str> = reference.split('-').collect();
        if parts.len() < 4 {
            return Err(PaymentError::MalformedReference(reference.to_string()));
        }

        Ok(DecodedReference {
            kind: parts[0].to_string(),
            plan: parts[1].to_string(),
            email: parts[2..parts.len() - 1].join("-"),
            nonce: parts[parts.len() - 1].to_string(),
        })
    }
}

/// Raw decoded fields; the reconciler decides how to interpret them
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedReference {
    pub kind: String,
    pub plan: String,
    pub email: String,
    pub nonce: String,
}

impl DecodedReference {
    /// Typed operation kind; None for anything unrecognized
    pub fn kind(&self) -> Option<OperationKind> {
        OperationKind::parse(&self.kind)
    }

    /// Typed plan from the catalog
    pub fn plan(&self) -> Result<Plan> {
        Plan::from_name(&self.plan).map_err(PaymentError::from)
    }
}
