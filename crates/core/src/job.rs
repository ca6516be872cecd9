// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queued normalization jobs.

use crate::connector::ConnectorId;
use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority band of a queued job. Higher bands drain first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    JobPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl JobPriority {
    /// Critical work gets two extra attempts.
    pub fn default_max_attempts(&self) -> u32 {
        match self {
            Self::Critical => 5,
            _ => 3,
        }
    }
}

/// Where a job's payload came from, for normalization context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSource {
    pub connector_name: String,
    pub vendor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// One unit of deferred normalization work.
///
/// A job is in exactly one of pending / in-flight / completed / failed at a
/// time; the queue's bands and history rings are the authoritative holders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestJob {
    pub id: JobId,
    pub connector_id: ConnectorId,
    /// Raw batch payload handed to the normalizer.
    pub payload: Value,
    pub source: JobSource,
    pub priority: JobPriority,
    pub attempts: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl IngestJob {
    pub fn new(
        connector_id: ConnectorId,
        payload: Value,
        source: JobSource,
        priority: JobPriority,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::generate(),
            connector_id,
            payload,
            source,
            priority,
            attempts: 0,
            max_attempts: priority.default_max_attempts(),
            enqueued_at,
            last_error: None,
        }
    }

    /// Whether another attempt is allowed after a failure.
    pub fn retryable(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
