// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sentra-storage: persistence seams shared with the external store.
//!
//! The production store lives outside this workspace; these traits pin the
//! shapes at their insertion points. [`MemoryStore`] implements all of them
//! for development mode and tests, and is concurrency-safe at row
//! granularity like the real store.

mod feed;
mod memory;
mod types;

pub use feed::{ChangeFeed, CONNECTORS_CHANGED};
pub use memory::MemoryStore;
pub use types::{ConnectorLogEntry, LogLevel};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentra_core::{
    AgentEntry, Alert, ConnectorId, ConnectorRecord, ConnectorStatus, RawEvent, ThreatIntel,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connector {0} not found")]
    NotFound(ConnectorId),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Authoritative connector rows.
#[async_trait]
pub trait ConnectorStore: Send + Sync {
    /// All rows with `is_active = true`, used at bootstrap.
    async fn load_active(&self) -> Result<Vec<ConnectorRecord>, StorageError>;

    async fn get(&self, id: ConnectorId) -> Result<Option<ConnectorRecord>, StorageError>;

    /// Create or replace a row, returning the stored version.
    async fn upsert(&self, record: ConnectorRecord) -> Result<ConnectorRecord, StorageError>;

    async fn update_status(
        &self,
        id: ConnectorId,
        status: ConnectorStatus,
        error_message: Option<String>,
    ) -> Result<(), StorageError>;

    /// Sweep write-back: throughput and the newest data timestamp.
    async fn record_throughput(
        &self,
        id: ConnectorId,
        events_per_min: u64,
        last_data: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    async fn record_success(
        &self,
        id: ConnectorId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Raw events, alerts, intel, and connector logs.
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Idempotent by event id: re-inserting the same id is a no-op, so every
    /// emitted event maps to exactly one persisted row.
    async fn insert_raw_event(&self, event: &RawEvent) -> Result<(), StorageError>;

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StorageError>;

    async fn insert_intel(&self, intel: &ThreatIntel) -> Result<(), StorageError>;

    async fn append_log(&self, entry: ConnectorLogEntry) -> Result<(), StorageError>;
}

/// Registered host agents, persisted by agent connectors.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn upsert_agent(
        &self,
        connector_id: ConnectorId,
        agent: AgentEntry,
    ) -> Result<(), StorageError>;

    async fn list_agents(
        &self,
        connector_id: ConnectorId,
    ) -> Result<Vec<AgentEntry>, StorageError>;
}
