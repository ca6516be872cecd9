// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sentra-vault: credential protection and agent bearer tokens.
//!
//! Credentials rest inside connector configuration as sealed AES-256-GCM
//! blobs whose key is derived per-blob from the process master key and a
//! fresh salt. The same master key signs the opaque bearer tokens handed to
//! registered host agents. The vault is read-only after construction.

mod credentials;
mod seal;
mod token;

pub use credentials::{sanitize_for_logging, CredentialSet};
pub use seal::SealedCredentials;
pub use token::{AgentTokenClaims, TokenVerification};

use sentra_core::{AgentId, Clock, ConnectorType, OrganizationId};
use thiserror::Error;

/// Environment variable carrying the master encryption key.
pub const MASTER_KEY_ENV: &str = "SENTRA_MASTER_KEY";
/// Development fallback seed, stretched into a master key with a fixed salt.
pub const KEY_SEED_ENV: &str = "SENTRA_KEY_SEED";

const FALLBACK_SALT: &[u8] = b"sentra-dev-master-key";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("no master key: set {MASTER_KEY_ENV} (or {KEY_SEED_ENV} for development)")]
    MissingMasterKey,

    #[error("credential blob is malformed or has been tampered with")]
    BadCredentialBlob,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("agent token is malformed")]
    BadToken,
}

/// Process-scoped credential vault. Construct once, share by reference.
pub struct Vault<C: Clock> {
    master_key: Vec<u8>,
    clock: C,
}

impl<C: Clock> Vault<C> {
    /// Build from an explicit master key.
    pub fn new(master_key: impl Into<Vec<u8>>, clock: C) -> Self {
        Self { master_key: master_key.into(), clock }
    }

    /// Build from the environment.
    ///
    /// Prefers `SENTRA_MASTER_KEY`; falls back to deriving a key from
    /// `SENTRA_KEY_SEED` with a fixed salt, warning once per process. The
    /// derived path is a development affordance only.
    pub fn from_env(clock: C) -> Result<Self, VaultError> {
        if let Ok(key) = std::env::var(MASTER_KEY_ENV) {
            if !key.is_empty() {
                return Ok(Self::new(key.into_bytes(), clock));
            }
        }
        let seed = std::env::var(KEY_SEED_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(VaultError::MissingMasterKey)?;

        static FALLBACK_WARNED: std::sync::Once = std::sync::Once::new();
        FALLBACK_WARNED.call_once(|| {
            tracing::warn!(
                "master key derived from {KEY_SEED_ENV}; set {MASTER_KEY_ENV} in production"
            );
        });

        let derived = seal::derive_key(seed.as_bytes(), FALLBACK_SALT)?;
        Ok(Self::new(derived.to_vec(), clock))
    }

    /// Seal a credential set for storage.
    pub fn encrypt(&self, plain: &CredentialSet) -> Result<SealedCredentials, VaultError> {
        seal::encrypt(&self.master_key, plain)
    }

    /// Open a sealed blob. Fails closed on any tag mismatch, truncation, or
    /// re-encoded field; never returns partial plaintext.
    pub fn decrypt(&self, sealed: &SealedCredentials) -> Result<CredentialSet, VaultError> {
        seal::decrypt(&self.master_key, sealed)
    }

    /// Connector-type-specific completeness check.
    pub fn validate(&self, credentials: &CredentialSet, ty: ConnectorType) -> bool {
        credentials.is_complete_for(ty)
    }

    /// Mint an opaque bearer token for a registered agent.
    pub fn issue_agent_token(&self, agent_id: &AgentId, org_id: OrganizationId) -> String {
        token::issue(&self.master_key, agent_id, org_id, self.clock.epoch_ms())
    }

    /// Verify an agent bearer token: HMAC must match and the token must have
    /// been issued within the last 24 hours (hard cutoff).
    pub fn verify_agent_token(&self, token: &str) -> TokenVerification {
        token::verify(&self.master_key, token, self.clock.epoch_ms())
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
