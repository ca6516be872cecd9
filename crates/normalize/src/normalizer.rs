// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The normalization pipeline.
//!
//! Per input: vendor rules → defaults → severity mapping → IOC extraction →
//! AI fallback when no rule produced a title. Inputs within a batch are
//! processed in arrival order and outputs retain that order.

use crate::ai::FallbackParser;
use crate::ioc::extract_iocs;
use crate::rules::{builtin_rules, VendorRules};
use crate::severity::vendor_severity;
use indexmap::IndexMap;
use sentra_core::{
    Alert, AlertSeverity, IntelType, OrganizationId, Relevance, ThreatIntel,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Context for one normalization call.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub vendor: String,
    pub connector_name: String,
    pub organization_id: OrganizationId,
}

/// Output of normalizing a single input.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub alert: Option<Alert>,
    pub intel: Option<ThreatIntel>,
}

/// Running counters; never reset, read for diagnostics.
#[derive(Debug, Default)]
pub struct NormalizerStats {
    pub processed: AtomicU64,
    pub alerts: AtomicU64,
    pub intel: AtomicU64,
    pub skipped_required: AtomicU64,
    pub ai_parsed: AtomicU64,
    pub ai_failures: AtomicU64,
}

/// Maps vendor-shaped inputs into canonical records. Pure with respect to
/// storage; side effects belong to the caller.
pub struct Normalizer {
    rules: IndexMap<String, VendorRules>,
    parser: Arc<dyn FallbackParser>,
    stats: NormalizerStats,
}

impl Normalizer {
    pub fn new(parser: Arc<dyn FallbackParser>) -> Self {
        Self { rules: builtin_rules(), parser, stats: NormalizerStats::default() }
    }

    /// Override or add the rule set for one vendor.
    pub fn set_rules(&mut self, vendor: impl Into<String>, rules: VendorRules) {
        self.rules.insert(vendor.into(), rules);
    }

    pub fn stats(&self) -> &NormalizerStats {
        &self.stats
    }

    /// Normalize a batch, preserving arrival order. Skipped records simply
    /// produce no output slot.
    pub async fn normalize_batch(
        &self,
        inputs: &[Value],
        ctx: &NormalizeContext,
    ) -> Vec<Normalized> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            if let Some(normalized) = self.normalize(input, ctx).await {
                out.push(normalized);
            }
        }
        out
    }

    /// Normalize one input into zero or one alert and zero or one intel
    /// record. Returns `None` when the record is skipped.
    pub async fn normalize(&self, input: &Value, ctx: &NormalizeContext) -> Option<Normalized> {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        let vendor_key = ctx.vendor.to_ascii_lowercase();
        let rules = self.rules.get(&vendor_key).cloned().unwrap_or_default();

        if let Some(field) = rules.missing_required(input) {
            self.stats.skipped_required.fetch_add(1, Ordering::Relaxed);
            debug!(vendor = %ctx.vendor, field, "skipping record: required field missing");
            return None;
        }

        let severity_raw = rules
            .severity
            .as_ref()
            .and_then(|r| crate::path::get_path(input, &r.path).cloned());
        let severity = vendor_severity(&ctx.vendor, input, severity_raw.as_ref());

        let mut title = rules.title.as_ref().and_then(|r| r.extract(input));
        let mut description = rules.description.as_ref().and_then(|r| r.extract(input));
        let mut ai_parsed = false;

        if title.is_none() {
            match self.parser.parse(input).await {
                Ok(Some(parsed)) => {
                    self.stats.ai_parsed.fetch_add(1, Ordering::Relaxed);
                    title = Some(parsed.title);
                    if description.is_none() {
                        description = Some(parsed.description);
                    }
                    ai_parsed = true;
                }
                Ok(None) => {}
                Err(err) => {
                    self.stats.ai_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(vendor = %ctx.vendor, error = %err, "ai fallback failed; record discarded");
                    return None;
                }
            }
        }

        let title = title.unwrap_or_else(|| format!("Alert from {}", ctx.vendor));
        let description = description
            .unwrap_or_else(|| serde_json::to_string(input).unwrap_or_default());

        let mut alert = Alert::new(title, severity, ctx.connector_name.clone(), ctx.organization_id)
            .description(description)
            .with_original(input.clone());
        if let Some(rule) = &rules.source_ip {
            alert.source_ip = rule.extract(input);
        }
        if let Some(rule) = &rules.destination_ip {
            alert.destination_ip = rule.extract(input);
        }
        if ai_parsed {
            alert.metadata.insert("parser".into(), json!("ai"));
        }

        let iocs = extract_iocs(input);
        let intel = self.build_intel(input, ctx, &alert, severity, &iocs);

        self.stats.alerts.fetch_add(1, Ordering::Relaxed);
        if intel.is_some() {
            self.stats.intel.fetch_add(1, Ordering::Relaxed);
        }
        if !iocs.is_empty() {
            alert.metadata.insert(
                "iocs".into(),
                serde_json::to_value(&iocs).unwrap_or(Value::Null),
            );
        }

        Some(Normalized { alert: Some(alert), intel })
    }

    fn build_intel(
        &self,
        input: &Value,
        ctx: &NormalizeContext,
        alert: &Alert,
        severity: AlertSeverity,
        iocs: &sentra_core::IocSet,
    ) -> Option<ThreatIntel> {
        let vendor_key = ctx.vendor.to_ascii_lowercase();
        let is_intel_vendor = matches!(vendor_key.as_str(), "misp" | "otx" | "virustotal");
        if !is_intel_vendor && iocs.is_empty() {
            return None;
        }

        let confidence = vt_confidence(input).unwrap_or(50);

        Some(ThreatIntel {
            intel_type: classify_intel(&alert.title, iocs),
            title: alert.title.clone(),
            description: alert.description.clone(),
            source: ctx.connector_name.clone(),
            severity,
            confidence,
            iocs: iocs.clone(),
            relevance: match severity {
                AlertSeverity::Critical | AlertSeverity::High => Relevance::High,
                AlertSeverity::Medium => Relevance::Medium,
                AlertSeverity::Low => Relevance::Low,
            },
        })
    }
}

/// Confidence from the VirusTotal malicious/(malicious+clean) ratio, as a
/// 0–100 score. Uses the same denominator as the severity mapping so the two
/// agree for any given payload.
fn vt_confidence(payload: &Value) -> Option<u8> {
    let stats = crate::path::get_path(payload, "attributes.last_analysis_stats")?.as_object()?;
    let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
    let malicious = count("malicious");
    let total = malicious + count("harmless");
    (total > 0).then(|| ThreatIntel::clamp_confidence((malicious * 100 / total) as i64))
}

/// Classify intel by title keywords, falling back on the IOC shape.
fn classify_intel(title: &str, iocs: &sentra_core::IocSet) -> IntelType {
    let lower = title.to_ascii_lowercase();
    if lower.contains("ransom") {
        IntelType::Ransomware
    } else if lower.contains("phish") {
        IntelType::Phishing
    } else if lower.contains("apt") {
        IntelType::Apt
    } else if lower.contains("malware") || lower.contains("trojan") {
        IntelType::Malware
    } else if !iocs.is_empty() {
        IntelType::Ioc
    } else {
        IntelType::General
    }
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
