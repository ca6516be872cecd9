// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vendor-specific extraction rules.
//!
//! A rule set maps alert fields to dotted paths inside the vendor payload,
//! with an optional transform. Rules marked required skip the record (not the
//! batch) when the path is absent.

use crate::path::get_path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transform applied to an extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    #[default]
    None,
    Lowercase,
    Uppercase,
    /// Render non-string scalars as their JSON text.
    Stringify,
}

/// One alert-field extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Dotted path into the payload.
    pub path: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub required: bool,
}

impl FieldRule {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), transform: Transform::None, required: false }
    }

    pub fn required(path: impl Into<String>) -> Self {
        Self { path: path.into(), transform: Transform::None, required: true }
    }

    /// Extract and transform this field from a payload.
    pub fn extract(&self, payload: &Value) -> Option<String> {
        let value = get_path(payload, &self.path)?;
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        Some(match self.transform {
            Transform::Lowercase => text.to_ascii_lowercase(),
            Transform::Uppercase => text.to_ascii_uppercase(),
            Transform::None | Transform::Stringify => text,
        })
    }
}

/// Field rules for one vendor, keyed by alert field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorRules {
    #[serde(default)]
    pub title: Option<FieldRule>,
    #[serde(default)]
    pub description: Option<FieldRule>,
    #[serde(default)]
    pub severity: Option<FieldRule>,
    #[serde(default)]
    pub source_ip: Option<FieldRule>,
    #[serde(default)]
    pub destination_ip: Option<FieldRule>,
}

impl VendorRules {
    fn rules(&self) -> impl Iterator<Item = (&'static str, &FieldRule)> {
        [
            ("title", self.title.as_ref()),
            ("description", self.description.as_ref()),
            ("severity", self.severity.as_ref()),
            ("source_ip", self.source_ip.as_ref()),
            ("destination_ip", self.destination_ip.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, rule)| rule.map(|r| (name, r)))
    }

    /// The first required rule whose path is absent from the payload, if any.
    pub fn missing_required(&self, payload: &Value) -> Option<&str> {
        self.rules()
            .find(|(_, rule)| rule.required && get_path(payload, &rule.path).is_none())
            .map(|(name, _)| name)
    }
}

/// Built-in rule sets for the vendors the platform ships with. Admin-defined
/// sets override these per connector.
pub fn builtin_rules() -> IndexMap<String, VendorRules> {
    let mut rules = IndexMap::new();

    rules.insert(
        "crowdstrike".into(),
        VendorRules {
            title: Some(FieldRule::required("detection_name")),
            description: Some(FieldRule::new("description")),
            severity: Some(FieldRule::new("severity")),
            source_ip: Some(FieldRule::new("device.local_ip")),
            destination_ip: Some(FieldRule::new("network.remote_ip")),
        },
    );

    rules.insert(
        "virustotal".into(),
        VendorRules {
            title: Some(FieldRule::new("attributes.meaningful_name")),
            description: Some(FieldRule::new("attributes.type_description")),
            ..Default::default()
        },
    );

    rules.insert(
        "misp".into(),
        VendorRules {
            title: Some(FieldRule::new("Event.info")),
            description: Some(FieldRule::new("Event.info")),
            ..Default::default()
        },
    );

    rules.insert(
        "otx".into(),
        VendorRules {
            title: Some(FieldRule::new("name")),
            description: Some(FieldRule::new("description")),
            ..Default::default()
        },
    );

    rules.insert(
        "generic".into(),
        VendorRules {
            title: Some(FieldRule::new("title")),
            description: Some(FieldRule::new("description")),
            severity: Some(FieldRule::new("severity")),
            source_ip: Some(FieldRule::new("source_ip")),
            destination_ip: Some(FieldRule::new("destination_ip")),
        },
    );

    rules
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
