// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store-side row shapes that do not belong to the core domain.

use chrono::{DateTime, Utc};
use sentra_core::ConnectorId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

sentra_core::simple_display! {
    LogLevel {
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// One connector-log row. The store caps retained rows per connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorLogEntry {
    pub connector_id: ConnectorId,
    pub level: LogLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ConnectorLogEntry {
    pub fn new(
        connector_id: ConnectorId,
        level: LogLevel,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self { connector_id, level, message: message.into(), at }
    }
}
