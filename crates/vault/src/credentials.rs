// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The decrypted credential shape and its logging sanitizer.

use indexmap::IndexMap;
use sentra_core::ConnectorType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decrypted per-connector credentials. Field names match the wire shape the
/// admin UI writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub custom_fields: IndexMap<String, Value>,
}

impl CredentialSet {
    fn has_user_pass(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Whether this set is complete enough for the given connector type.
    pub fn is_complete_for(&self, ty: ConnectorType) -> bool {
        match ty {
            ConnectorType::Api => {
                self.api_key.is_some() || self.token.is_some() || self.has_user_pass()
            }
            ConnectorType::Agent => self.token.is_some() || self.certificate.is_some(),
            // Listeners and watchers carry no mandatory secret.
            ConnectorType::Syslog | ConnectorType::Webhook | ConnectorType::File => true,
        }
    }
}

/// Mask one secret: `****` when four characters or fewer, else the first
/// four characters followed by `****`.
fn mask(value: &str) -> String {
    if value.len() <= 4 {
        "****".into()
    } else {
        format!("{}****", &value[..4])
    }
}

/// Produce a log-safe view of a credential set.
///
/// String values are masked, nested objects and arrays are replaced with the
/// literal `[OBJECT]`, absent fields are omitted.
pub fn sanitize_for_logging(credentials: &CredentialSet) -> Map<String, Value> {
    let serialized = match serde_json::to_value(credentials) {
        Ok(Value::Object(map)) => map,
        _ => return Map::new(),
    };
    let mut out = Map::new();
    for (key, value) in serialized {
        let masked = match value {
            Value::String(s) => Value::String(mask(&s)),
            Value::Object(_) | Value::Array(_) => Value::String("[OBJECT]".into()),
            other => Value::String(mask(&other.to_string())),
        };
        out.insert(key, masked);
    }
    out
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
