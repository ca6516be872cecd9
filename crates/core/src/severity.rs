// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Severity scales.
//!
//! Connectors emit [`EventSeverity`] (log-flavored); the normalizer and every
//! persisted alert use the canonical [`AlertSeverity`] four-step scale.

use serde::{Deserialize, Serialize};

/// Severity of a raw event as emitted by a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
    Critical,
}

crate::simple_display! {
    EventSeverity {
        Info => "info",
        Warn => "warn",
        Error => "error",
        Critical => "critical",
    }
}

impl EventSeverity {
    /// Bucket a syslog severity code (0–7) into an event severity.
    ///
    /// 0–2 critical, 3 error, 4 warn, 5–7 info.
    pub fn from_syslog_code(code: u8) -> Self {
        match code {
            0..=2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warn,
            _ => Self::Info,
        }
    }
}

/// Canonical alert severity persisted for analyst consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    AlertSeverity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl AlertSeverity {
    /// Whether this severity triggers the insight/incident collaborators.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl From<EventSeverity> for AlertSeverity {
    fn from(sev: EventSeverity) -> Self {
        match sev {
            EventSeverity::Info => Self::Low,
            EventSeverity::Warn => Self::Medium,
            EventSeverity::Error => Self::High,
            EventSeverity::Critical => Self::Critical,
        }
    }
}

#[cfg(test)]
#[path = "severity_tests.rs"]
mod tests;
