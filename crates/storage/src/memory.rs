// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store used in development mode and by every test.

use crate::types::ConnectorLogEntry;
use crate::{AgentStore, ConnectorStore, IngestStore, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sentra_core::{
    AgentEntry, AgentId, Alert, ConnectorId, ConnectorRecord, ConnectorStatus, EventId, RawEvent,
    ThreatIntel,
};
use std::collections::{BTreeMap, HashMap};

/// Retained log rows per connector.
const LOG_CAP: usize = 500;

#[derive(Default)]
struct Rows {
    connectors: BTreeMap<i64, ConnectorRecord>,
    raw_events: HashMap<EventId, RawEvent>,
    /// Insertion order of raw events, for listings.
    raw_order: Vec<EventId>,
    alerts: Vec<Alert>,
    intel: Vec<ThreatIntel>,
    logs: HashMap<ConnectorId, Vec<ConnectorLogEntry>>,
    agents: HashMap<ConnectorId, BTreeMap<String, AgentEntry>>,
}

/// Concurrency-safe at row granularity, like the real store.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- test/introspection accessors -----

    pub fn raw_events(&self) -> Vec<RawEvent> {
        let rows = self.rows.lock();
        rows.raw_order.iter().filter_map(|id| rows.raw_events.get(id).cloned()).collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.rows.lock().alerts.clone()
    }

    pub fn intel(&self) -> Vec<ThreatIntel> {
        self.rows.lock().intel.clone()
    }

    pub fn logs(&self, connector_id: ConnectorId) -> Vec<ConnectorLogEntry> {
        self.rows.lock().logs.get(&connector_id).cloned().unwrap_or_default()
    }

    pub fn agents_for(&self, connector_id: ConnectorId) -> Vec<AgentEntry> {
        self.rows
            .lock()
            .agents
            .get(&connector_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn agent(&self, connector_id: ConnectorId, agent_id: &AgentId) -> Option<AgentEntry> {
        self.rows
            .lock()
            .agents
            .get(&connector_id)
            .and_then(|m| m.get(agent_id.as_str()).cloned())
    }
}

#[async_trait]
impl ConnectorStore for MemoryStore {
    async fn load_active(&self) -> Result<Vec<ConnectorRecord>, StorageError> {
        Ok(self
            .rows
            .lock()
            .connectors
            .values()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn get(&self, id: ConnectorId) -> Result<Option<ConnectorRecord>, StorageError> {
        Ok(self.rows.lock().connectors.get(&id.0).cloned())
    }

    async fn upsert(&self, mut record: ConnectorRecord) -> Result<ConnectorRecord, StorageError> {
        record.updated_at = Utc::now();
        self.rows.lock().connectors.insert(record.id.0, record.clone());
        Ok(record)
    }

    async fn update_status(
        &self,
        id: ConnectorId,
        status: ConnectorStatus,
        error_message: Option<String>,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.lock();
        let record = rows.connectors.get_mut(&id.0).ok_or(StorageError::NotFound(id))?;
        record.status = status;
        record.error_message = error_message;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_throughput(
        &self,
        id: ConnectorId,
        events_per_min: u64,
        last_data: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.lock();
        let record = rows.connectors.get_mut(&id.0).ok_or(StorageError::NotFound(id))?;
        record.events_per_min = events_per_min;
        if last_data.is_some() {
            record.last_data = last_data;
        }
        Ok(())
    }

    async fn record_success(
        &self,
        id: ConnectorId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows.lock();
        let record = rows.connectors.get_mut(&id.0).ok_or(StorageError::NotFound(id))?;
        record.last_successful_connection = Some(at);
        Ok(())
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn insert_raw_event(&self, event: &RawEvent) -> Result<(), StorageError> {
        let mut rows = self.rows.lock();
        if rows.raw_events.contains_key(&event.id) {
            return Ok(());
        }
        rows.raw_order.push(event.id.clone());
        rows.raw_events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), StorageError> {
        self.rows.lock().alerts.push(alert.clone());
        Ok(())
    }

    async fn insert_intel(&self, intel: &ThreatIntel) -> Result<(), StorageError> {
        self.rows.lock().intel.push(intel.clone());
        Ok(())
    }

    async fn append_log(&self, entry: ConnectorLogEntry) -> Result<(), StorageError> {
        let mut rows = self.rows.lock();
        let logs = rows.logs.entry(entry.connector_id).or_default();
        if logs.len() >= LOG_CAP {
            logs.remove(0);
        }
        logs.push(entry);
        Ok(())
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn upsert_agent(
        &self,
        connector_id: ConnectorId,
        agent: AgentEntry,
    ) -> Result<(), StorageError> {
        self.rows
            .lock()
            .agents
            .entry(connector_id)
            .or_default()
            .insert(agent.agent_id.as_str().to_string(), agent);
        Ok(())
    }

    async fn list_agents(
        &self,
        connector_id: ConnectorId,
    ) -> Result<Vec<AgentEntry>, StorageError> {
        Ok(self.agents_for(connector_id))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
