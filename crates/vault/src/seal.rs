// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated sealing of credential sets.
//!
//! Each blob uses a fresh 16-byte salt and 16-byte IV; the AES-256-GCM key is
//! derived from the master key and the salt with Argon2id. The GCM tag is
//! stored separately so the quadruple {ciphertext, iv, tag, salt} matches the
//! persisted shape, all hex-encoded.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::credentials::CredentialSet;
use crate::VaultError;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Sealed credential blob as persisted in the connector row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedCredentials {
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
    pub salt: String,
}

/// Derive a 32-byte key from the master key and a salt.
pub(crate) fn derive_key(master: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], VaultError> {
    let mut out = [0u8; KEY_LEN];
    argon2::Argon2::default()
        .hash_password_into(master, salt, &mut out)
        .map_err(|_| VaultError::KeyDerivation)?;
    Ok(out)
}

pub(crate) fn encrypt(
    master: &[u8],
    plain: &CredentialSet,
) -> Result<SealedCredentials, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut iv);

    let key = derive_key(master, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    // AES-GCM nonces are 12 bytes; the stored IV keeps the full 16 and the
    // cipher consumes its first 12.
    let nonce = Nonce::from_slice(&iv[..12]);

    let plaintext = serde_json::to_vec(plain).map_err(|_| VaultError::BadCredentialBlob)?;
    let sealed = cipher
        .encrypt(nonce, Payload { msg: &plaintext, aad: &[] })
        .map_err(|_| VaultError::BadCredentialBlob)?;

    // aes-gcm appends the tag to the ciphertext; store them separately.
    let split = sealed.len().saturating_sub(TAG_LEN);
    let (ciphertext, tag) = sealed.split_at(split);

    Ok(SealedCredentials {
        ciphertext: hex::encode(ciphertext),
        iv: hex::encode(iv),
        tag: hex::encode(tag),
        salt: hex::encode(salt),
    })
}

pub(crate) fn decrypt(
    master: &[u8],
    sealed: &SealedCredentials,
) -> Result<CredentialSet, VaultError> {
    let ciphertext = hex::decode(&sealed.ciphertext).map_err(|_| VaultError::BadCredentialBlob)?;
    let iv = hex::decode(&sealed.iv).map_err(|_| VaultError::BadCredentialBlob)?;
    let tag = hex::decode(&sealed.tag).map_err(|_| VaultError::BadCredentialBlob)?;
    let salt = hex::decode(&sealed.salt).map_err(|_| VaultError::BadCredentialBlob)?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN || salt.len() != SALT_LEN {
        return Err(VaultError::BadCredentialBlob);
    }

    let key = derive_key(master, &salt)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&iv[..12]);

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: &combined, aad: &[] })
        .map_err(|_| VaultError::BadCredentialBlob)?;

    serde_json::from_slice(&plaintext).map_err(|_| VaultError::BadCredentialBlob)
}

#[cfg(test)]
#[path = "seal_tests.rs"]
mod tests;
