// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-window rate limiter, one per endpoint.
//!
//! `requests` slots per `window_ms`; when the window is exhausted the caller
//! sleeps until it rolls. The sleep is an await point, so `stop()` can cancel
//! it from outside via `tokio::select!`.

use parking_lot::Mutex;
use sentra_core::RateLimitConfig;
use std::time::Duration;
use tokio::time::Instant;

struct WindowState {
    window_start: Instant,
    used: u32,
}

pub struct FixedWindow {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl FixedWindow {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState { window_start: Instant::now(), used: 0 }),
        }
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.config.window_ms)
    }

    /// Claim one request slot, sleeping until the window rolls if necessary.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                if now.duration_since(state.window_start) >= self.window() {
                    state.window_start = now;
                    state.used = 0;
                }
                if state.used < self.config.requests {
                    state.used += 1;
                    return;
                }
                self.window() - now.duration_since(state.window_start)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Slots still available in the current window (diagnostics).
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock();
        if state.window_start.elapsed() >= self.window() {
            self.config.requests
        } else {
            self.config.requests.saturating_sub(state.used)
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
