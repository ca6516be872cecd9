// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source-severity mapping into the canonical four-step scale.
//!
//! Numeric values use the 0–10 convention; strings are classified into the
//! canonical classes; vendor payloads with richer signals (VirusTotal
//! analysis ratios, MISP threat levels, OTX TLP) override both.

use crate::path::get_path;
use sentra_core::AlertSeverity;
use serde_json::Value;

/// Map a raw severity value into the canonical scale. Unknown inputs map to
/// `Medium`. Already-canonical strings map to themselves, so the mapping is
/// idempotent.
pub fn map_severity(raw: &Value) -> AlertSeverity {
    match raw {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                map_numeric(f)
            } else {
                AlertSeverity::Medium
            }
        }
        Value::String(s) => {
            // Numeric strings take the numeric path.
            if let Ok(f) = s.trim().parse::<f64>() {
                map_numeric(f)
            } else {
                map_string(s)
            }
        }
        _ => AlertSeverity::Medium,
    }
}

/// Numeric scale in [0, 10]: ≥9 critical, ≥7 high, ≥4 medium, else low.
fn map_numeric(value: f64) -> AlertSeverity {
    if value >= 9.0 {
        AlertSeverity::Critical
    } else if value >= 7.0 {
        AlertSeverity::High
    } else if value >= 4.0 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    }
}

fn map_string(value: &str) -> AlertSeverity {
    match value.trim().to_ascii_lowercase().as_str() {
        "critical" | "fatal" | "emergency" | "severe" => AlertSeverity::Critical,
        "high" | "important" | "error" | "danger" | "red" | "major" => AlertSeverity::High,
        "medium" | "moderate" | "warning" | "amber" | "yellow" => AlertSeverity::Medium,
        "low" | "minor" | "info" | "informational" | "green" => AlertSeverity::Low,
        _ => AlertSeverity::Medium,
    }
}

/// VirusTotal: severity from the malicious/(malicious+clean) verdict ratio.
/// Suspicious and undetected verdicts are not counted as clean.
///
/// >0.7 critical, >0.4 high, >0.1 medium, else low. Returns `None` when the
/// payload lacks analysis stats.
pub(crate) fn virustotal_severity(payload: &Value) -> Option<AlertSeverity> {
    let stats = get_path(payload, "attributes.last_analysis_stats")?.as_object()?;
    let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
    let malicious = count("malicious");
    let total = malicious + count("harmless");
    if total == 0 {
        return None;
    }
    let ratio = malicious as f64 / total as f64;
    Some(if ratio > 0.7 {
        AlertSeverity::Critical
    } else if ratio > 0.4 {
        AlertSeverity::High
    } else if ratio > 0.1 {
        AlertSeverity::Medium
    } else {
        AlertSeverity::Low
    })
}

/// MISP: `threat_level_id` 1..4 maps critical/high/medium/low.
pub(crate) fn misp_severity(payload: &Value) -> Option<AlertSeverity> {
    let level = get_path(payload, "Event.threat_level_id")
        .or_else(|| get_path(payload, "threat_level_id"))?;
    let level = match level {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Some(match level {
        1 => AlertSeverity::Critical,
        2 => AlertSeverity::High,
        3 => AlertSeverity::Medium,
        4 => AlertSeverity::Low,
        _ => return None,
    })
}

/// OTX: TLP red/amber/green/white maps critical/high/medium/low.
pub(crate) fn otx_severity(payload: &Value) -> Option<AlertSeverity> {
    let tlp = get_path(payload, "tlp").or_else(|| get_path(payload, "TLP"))?.as_str()?;
    Some(match tlp.to_ascii_lowercase().as_str() {
        "red" => AlertSeverity::Critical,
        "amber" => AlertSeverity::High,
        "green" => AlertSeverity::Medium,
        "white" => AlertSeverity::Low,
        _ => return None,
    })
}

/// Vendor-aware severity: overrides first, then the raw severity field.
pub(crate) fn vendor_severity(vendor: &str, payload: &Value, raw: Option<&Value>) -> AlertSeverity {
    let vendor_override = match vendor.to_ascii_lowercase().as_str() {
        "virustotal" => virustotal_severity(payload),
        "misp" => misp_severity(payload),
        "otx" | "alienvault" => otx_severity(payload),
        _ => None,
    };
    if let Some(severity) = vendor_override {
        return severity;
    }
    raw.map(map_severity).unwrap_or(AlertSeverity::Medium)
}

#[cfg(test)]
#[path = "severity_tests.rs"]
mod tests;
