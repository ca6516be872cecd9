// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque agent bearer tokens.
//!
//! A token is `base64(claims_json "." hex(HMAC-SHA256(claims_json, master)))`.
//! Verification requires a matching MAC and an `issued_at` within the last
//! 24 hours; expiry is a hard cutoff.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sentra_core::{AgentId, OrganizationId};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Claims embedded in an agent bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTokenClaims {
    pub agent_id: AgentId,
    pub org_id: OrganizationId,
    pub issued_at: u64,
    #[serde(rename = "type")]
    pub token_type: String,
}

/// Outcome of verifying a presented token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerification {
    Valid(AgentTokenClaims),
    /// MAC mismatch, malformed wrapping, or wrong token type.
    Invalid,
    /// MAC was fine but the token is older than 24 hours.
    Expired,
}

impl TokenVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

fn mac_hex(master: &[u8], payload: &[u8]) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(master).unwrap_or_else(|_| {
        unreachable!("hmac accepts any key length")
    });
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn issue(
    master: &[u8],
    agent_id: &AgentId,
    org_id: OrganizationId,
    now_ms: u64,
) -> String {
    let claims = AgentTokenClaims {
        agent_id: agent_id.clone(),
        org_id,
        issued_at: now_ms,
        token_type: "agent".into(),
    };
    // Claims serialize from a plain struct; this cannot fail.
    let payload = serde_json::to_string(&claims).unwrap_or_default();
    let sig = mac_hex(master, payload.as_bytes());
    BASE64.encode(format!("{payload}.{sig}"))
}

pub(crate) fn verify(master: &[u8], token: &str, now_ms: u64) -> TokenVerification {
    let Ok(decoded) = BASE64.decode(token) else {
        return TokenVerification::Invalid;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return TokenVerification::Invalid;
    };
    let Some((payload, sig)) = decoded.rsplit_once('.') else {
        return TokenVerification::Invalid;
    };

    // Compare MACs in constant time.
    let mut mac = match <HmacSha256 as Mac>::new_from_slice(master) {
        Ok(mac) => mac,
        Err(_) => return TokenVerification::Invalid,
    };
    mac.update(payload.as_bytes());
    let Ok(sig_bytes) = hex::decode(sig) else {
        return TokenVerification::Invalid;
    };
    if mac.verify_slice(&sig_bytes).is_err() {
        return TokenVerification::Invalid;
    }

    let Ok(claims) = serde_json::from_str::<AgentTokenClaims>(payload) else {
        return TokenVerification::Invalid;
    };
    if claims.token_type != "agent" {
        return TokenVerification::Invalid;
    }
    if now_ms.saturating_sub(claims.issued_at) > TOKEN_TTL_MS {
        return TokenVerification::Expired;
    }
    TokenVerification::Valid(claims)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
