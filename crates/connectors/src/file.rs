// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File watcher connector.
//!
//! Watches configured roots recursively, with substring include/exclude
//! patterns and optional SHA-256 content hashing for change detection.
//! Severity classification (first match wins): delete of a critical system
//! path, executable create/change, change of a critical path, high-priority
//! regex match, else info.

use crate::connector::{Connector, HealthReport, TestOutcome};
use crate::error::ConnectorError;
use crate::harness::{ConnectorRx, Harness};
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use regex::Regex;
use sentra_core::{
    Clock, ConnectorConfig, ConnectorId, ConnectorMetrics, ConnectorStatus, ConnectorType,
    EventSeverity, FileConfig, Parse, RawEvent,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

const CRITICAL_PATHS: [&str; 6] =
    ["/etc/", "/bin/", "/sbin/", "/usr/bin/", "/boot/", "C:\\Windows\\System32"];

const EXECUTABLE_EXTENSIONS: [&str; 9] =
    ["exe", "dll", "bat", "cmd", "sh", "ps1", "scr", "com", "msi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Create,
    Modify,
    Remove,
}

sentra_core::simple_display! {
    ChangeKind {
        Create => "create",
        Modify => "modify",
        Remove => "remove",
    }
}

fn is_critical(path: &str) -> bool {
    CRITICAL_PATHS.iter().any(|prefix| path.starts_with(prefix))
}

fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXECUTABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Severity of one file-system change.
pub(crate) fn classify(kind: ChangeKind, path: &Path, high_priority: Option<&Regex>) -> EventSeverity {
    let text = path.to_string_lossy();
    if kind == ChangeKind::Remove && is_critical(&text) {
        return EventSeverity::Critical;
    }
    if matches!(kind, ChangeKind::Create | ChangeKind::Modify) && is_executable(path) {
        return EventSeverity::Warn;
    }
    if kind == ChangeKind::Modify && is_critical(&text) {
        return EventSeverity::Error;
    }
    if high_priority.is_some_and(|re| re.is_match(&text)) {
        return if kind == ChangeKind::Remove { EventSeverity::Error } else { EventSeverity::Warn };
    }
    EventSeverity::Info
}

struct Inner<C: Clock> {
    harness: Harness<C>,
    config: Mutex<FileConfig>,
    high_priority: Mutex<Option<Regex>>,
    hashes: Mutex<HashMap<PathBuf, String>>,
}

impl<C: Clock> Inner<C> {
    fn passes_patterns(&self, path: &str) -> bool {
        let config = self.config.lock();
        if !config.include.is_empty() && !config.include.iter().any(|p| path.contains(p)) {
            return false;
        }
        !config.exclude.iter().any(|p| path.contains(p))
    }

    fn handle_event(&self, event: Event) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Modify(_) => ChangeKind::Modify,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => return,
        };
        for path in event.paths {
            self.handle_path(kind, &path);
        }
    }

    fn handle_path(&self, kind: ChangeKind, path: &Path) {
        let text = path.to_string_lossy().into_owned();
        if !self.passes_patterns(&text) {
            return;
        }

        let hashing = self.config.lock().hash_contents;
        let mut hash = None;
        let mut content_changed = None;
        match kind {
            ChangeKind::Create | ChangeKind::Modify if hashing => {
                match std::fs::read(path) {
                    Ok(bytes) => {
                        let digest = hex::encode(Sha256::digest(&bytes));
                        let previous =
                            self.hashes.lock().insert(path.to_path_buf(), digest.clone());
                        content_changed = Some(previous.as_deref() != Some(digest.as_str()));
                        hash = Some(digest);
                    }
                    Err(e) => {
                        // Raced with a delete or unreadable; still report.
                        self.harness.record_soft_error(format!("hash {text}: {e}"));
                    }
                }
            }
            ChangeKind::Remove => {
                self.hashes.lock().remove(path);
            }
            _ => {}
        }

        let high = self.high_priority.lock();
        let severity = classify(kind, path, high.as_ref());
        let is_high = high.as_ref().is_some_and(|re| re.is_match(&text));
        drop(high);

        let mut event = RawEvent::new(
            self.harness.id(),
            self.harness.clock().now_utc(),
            text.clone(),
            format!("{kind} {text}"),
            severity,
        )
        .with_field("path", json!(text))
        .with_field("kind", json!(kind.to_string()))
        .with_field("high_priority", json!(is_high));
        if let Some(hash) = hash {
            event = event.with_field("sha256", json!(hash));
        }
        if let Some(changed) = content_changed {
            event = event.with_field("content_changed", json!(changed));
        }
        self.harness.emit(event);
    }
}

/// Recursive path-watch connector.
pub struct FileWatcherConnector<C: Clock> {
    inner: Arc<Inner<C>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl<C: Clock> FileWatcherConnector<C> {
    pub fn new(
        id: ConnectorId,
        name: impl Into<String>,
        config: FileConfig,
        clock: C,
    ) -> (Self, ConnectorRx) {
        let (harness, rx) = Harness::new(id, name, clock);
        let connector = Self {
            inner: Arc::new(Inner {
                harness,
                config: Mutex::new(config),
                high_priority: Mutex::new(None),
                hashes: Mutex::new(HashMap::new()),
            }),
            watcher: Mutex::new(None),
        };
        (connector, rx)
    }

    fn build_watcher(&self) -> Result<RecommendedWatcher, ConnectorError> {
        let config = self.inner.config.lock().clone();

        let high_priority = match &config.high_priority_pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ConnectorError::Config(sentra_core::ConfigError::Invalid(format!(
                    "high_priority_pattern: {e}"
                )))
            })?),
            None => None,
        };
        *self.inner.high_priority.lock() = high_priority;

        let inner = self.inner.clone();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => inner.handle_event(event),
                Err(e) => inner.harness.record_soft_error(format!("watch: {e}")),
            })
            .map_err(|e| ConnectorError::Invariant(format!("watcher init: {e}")))?;

        for root in &config.paths {
            watcher.watch(Path::new(root), RecursiveMode::Recursive).map_err(|e| {
                ConnectorError::Config(sentra_core::ConfigError::Invalid(format!(
                    "cannot watch {root}: {e}"
                )))
            })?;
        }
        Ok(watcher)
    }
}

#[async_trait]
impl<C: Clock> Connector for FileWatcherConnector<C> {
    fn id(&self) -> ConnectorId {
        self.inner.harness.id()
    }

    fn name(&self) -> &str {
        self.inner.harness.name()
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::File
    }

    fn status(&self) -> ConnectorStatus {
        self.inner.harness.status()
    }

    fn metrics(&self) -> ConnectorMetrics {
        self.inner.harness.metrics()
    }

    async fn start(&self) -> Result<(), ConnectorError> {
        if self.status() == ConnectorStatus::Active {
            return Ok(());
        }
        match self.build_watcher() {
            Ok(watcher) => {
                *self.watcher.lock() = Some(watcher);
                self.inner.harness.set_status(ConnectorStatus::Active, None);
                Ok(())
            }
            Err(e) => {
                self.inner.harness.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn stop(&self) {
        // Dropping the watcher stops its threads and all watches.
        *self.watcher.lock() = None;
        self.inner.hashes.lock().clear();
        self.inner.harness.set_status(ConnectorStatus::Disabled, None);
    }

    async fn pause(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Active {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        *self.watcher.lock() = None;
        self.inner.harness.set_status(ConnectorStatus::Paused, None);
        Ok(())
    }

    async fn resume(&self) -> Result<(), ConnectorError> {
        if self.status() != ConnectorStatus::Paused {
            return Err(ConnectorError::InvalidState(self.status()));
        }
        let watcher = self.build_watcher()?;
        *self.watcher.lock() = Some(watcher);
        self.inner.harness.set_status(ConnectorStatus::Active, None);
        Ok(())
    }

    async fn health_check(&self) -> HealthReport {
        let at = self.inner.harness.clock().now_utc();
        if self.status().is_running() && self.watcher.lock().is_some() {
            let roots = self.inner.config.lock().paths.len();
            HealthReport::healthy(format!("watching {roots} roots"), at)
        } else {
            HealthReport::unhealthy(format!("status {}", self.status()), at)
        }
    }

    async fn test_connection(&self) -> TestOutcome {
        let config = self.inner.config.lock().clone();
        let missing: Vec<String> = config
            .paths
            .iter()
            .filter(|root| !Path::new(root.as_str()).exists())
            .cloned()
            .collect();
        if missing.is_empty() {
            TestOutcome { success: true, message: "all watch roots exist".into() }
        } else {
            TestOutcome {
                success: false,
                message: format!("missing watch roots: {}", missing.join(", ")),
            }
        }
    }

    async fn update_config(&self, patch: serde_json::Value) -> Result<(), ConnectorError> {
        let (config, dropped) = ConnectorConfig::parse(ConnectorType::File, &patch, Parse::Lenient)?;
        if !dropped.is_empty() {
            warn!(connector = %self.id(), ?dropped, "ignoring unknown config fields");
        }
        let ConnectorConfig::File(config) = config else {
            return Err(ConnectorError::Invariant("non-file config for file connector".into()));
        };
        let was_running = self.status() == ConnectorStatus::Active;
        *self.inner.config.lock() = config;
        if was_running {
            *self.watcher.lock() = None;
            let watcher = self.build_watcher()?;
            *self.watcher.lock() = Some(watcher);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
