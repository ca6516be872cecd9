// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam for the external AI fallback parser.
//!
//! Invoked only when deterministic rules produce no usable title. Failure is
//! non-fatal: the record is discarded and counted.

use async_trait::async_trait;
use sentra_core::AlertSeverity;
use serde_json::Value;

/// What the fallback parser managed to pull out of an unstructured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AiParsed {
    pub title: String,
    pub description: String,
    pub severity: Option<AlertSeverity>,
}

/// External AI parsing collaborator.
#[async_trait]
pub trait FallbackParser: Send + Sync {
    /// Attempt to derive a structured alert from the raw payload.
    /// `Ok(None)` means the parser declined; `Err` means it failed.
    async fn parse(&self, payload: &Value) -> Result<Option<AiParsed>, String>;
}

/// Default collaborator when no AI backend is configured.
pub struct NoFallback;

#[async_trait]
impl FallbackParser for NoFallback {
    async fn parse(&self, _payload: &Value) -> Result<Option<AiParsed>, String> {
        Ok(None)
    }
}
