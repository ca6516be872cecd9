// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Record extraction and pagination cursors.

use sentra_core::{PaginationConfig, PaginationMode};
use serde_json::Value;

/// Hard cap on pages fetched per execution cycle.
pub const MAX_PAGES: u32 = 10;

const RECORD_KEYS: [&str; 3] = ["data", "items", "results"];

/// Extract the record list from a response body: the first non-empty of
/// `data` / `items` / `results`, else the raw body.
pub fn extract_records(body: &Value) -> Vec<Value> {
    let mut saw_container = false;
    for key in RECORD_KEYS {
        match body.get(key).and_then(Value::as_array) {
            Some(arr) if !arr.is_empty() => return arr.clone(),
            Some(_) => saw_container = true,
            None => {}
        }
    }
    if saw_container {
        // A recognized-but-empty container is an empty page, not a raw body.
        return Vec::new();
    }
    match body {
        Value::Array(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Page-walk state for one endpoint execution.
pub struct Paginator<'a> {
    config: Option<&'a PaginationConfig>,
    page: u32,
    offset: u64,
    cursor: Option<String>,
    pages_fetched: u32,
}

impl<'a> Paginator<'a> {
    pub fn new(config: Option<&'a PaginationConfig>) -> Self {
        Self { config, page: 1, offset: 0, cursor: None, pages_fetched: 0 }
    }

    /// Query parameters for the next request.
    pub fn params(&self) -> Vec<(String, String)> {
        let Some(config) = self.config else { return Vec::new() };
        let mut params = vec![(config.limit_param.clone(), config.limit.to_string())];
        match config.mode {
            PaginationMode::Page => {
                params.push((config.param.clone(), self.page.to_string()));
            }
            PaginationMode::Offset => {
                params.push((config.param.clone(), self.offset.to_string()));
            }
            PaginationMode::Cursor => {
                if let Some(cursor) = &self.cursor {
                    params.push((config.param.clone(), cursor.clone()));
                }
            }
        }
        params
    }

    /// Digest a response; returns whether another page should be fetched.
    ///
    /// Iteration stops when the cursor is empty, a page yields fewer records
    /// than the configured limit, or the page cap is reached.
    pub fn advance(&mut self, body: &Value, records: usize) -> bool {
        let Some(config) = self.config else { return false };
        self.pages_fetched += 1;
        if self.pages_fetched >= MAX_PAGES {
            return false;
        }
        if records < config.limit as usize {
            return false;
        }
        match config.mode {
            PaginationMode::Page => {
                self.page += 1;
                true
            }
            PaginationMode::Offset => {
                self.offset += records as u64;
                true
            }
            PaginationMode::Cursor => {
                let next = config
                    .cursor_path
                    .as_deref()
                    .and_then(|path| crate::api::get_path(body, path))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                match next {
                    Some(cursor) => {
                        self.cursor = Some(cursor);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
