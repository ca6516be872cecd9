// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threat-intelligence records and indicator-of-compromise sets.

use serde::{Deserialize, Serialize};

/// Category of a threat-intel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntelType {
    Malware,
    Apt,
    Ransomware,
    Phishing,
    Ioc,
    General,
}

crate::simple_display! {
    IntelType {
        Malware => "malware",
        Apt => "apt",
        Ransomware => "ransomware",
        Phishing => "phishing",
        Ioc => "ioc",
        General => "general",
    }
}

/// How relevant a record is to the organization's environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    Low,
    Medium,
    High,
}

crate::simple_display! {
    Relevance {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

/// The four-bucket indicator map extracted from intel payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IocSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl IocSet {
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.domains.is_empty() && self.hashes.is_empty() && self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ips.len() + self.domains.len() + self.hashes.len() + self.urls.len()
    }

    /// Merge another set into this one, deduplicating per bucket.
    pub fn merge(&mut self, other: IocSet) {
        fn absorb(dst: &mut Vec<String>, src: Vec<String>) {
            for v in src {
                if !dst.contains(&v) {
                    dst.push(v);
                }
            }
        }
        absorb(&mut self.ips, other.ips);
        absorb(&mut self.domains, other.domains);
        absorb(&mut self.hashes, other.hashes);
        absorb(&mut self.urls, other.urls);
    }
}

/// Post-normalization threat-intel record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatIntel {
    #[serde(rename = "type")]
    pub intel_type: IntelType,
    pub title: String,
    pub description: String,
    pub source: String,
    pub severity: crate::severity::AlertSeverity,
    /// Confidence score clamped to 0–100.
    pub confidence: u8,
    #[serde(default)]
    pub iocs: IocSet,
    pub relevance: Relevance,
}

impl ThreatIntel {
    /// Clamp an arbitrary confidence value into the 0–100 range.
    pub fn clamp_confidence(raw: i64) -> u8 {
        raw.clamp(0, 100) as u8
    }
}

#[cfg(test)]
#[path = "intel_tests.rs"]
mod tests;
