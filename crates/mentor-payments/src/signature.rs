//! Webhook Signature Verification
//!
//! Validates the gateway's `x-signature` header (`ts=...,v1=...`): an
//! HMAC-SHA256 over the canonical manifest
//! `id:{resource id};request-id:{request id};ts:{ts};` keyed with the
//! configured webhook secret. The reconciler's re-fetch of the payment
//! record stays authoritative regardless of this check.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `x-signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub ts: String,
    pub v1: String,
}

impl SignatureHeader {
    /// Parse a `ts=...,v1=...` header value
    pub fn parse(header: &str) -> Option<Self> {
        let mut ts = None;
        let mut v1 = None;

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=')?;
            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        Some(Self { ts: ts?, v1: v1? })
    }
}

/// Verify a webhook signature against the canonical manifest
pub fn verify_signature(
    secret: &str,
    resource_id: &str,
    request_id: &str,
    header: &SignatureHeader,
) -> bool {
    let manifest = format!(
        "id:{resource_id};request-id:{request_id};ts:{ts};",
        ts = header.ts
    );

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(manifest.as_bytes());

    let Ok(signature) = hex::decode(&header.v1) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}
