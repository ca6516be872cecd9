// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Jittered exponential backoff for request retries.

use rand::Rng;
use sentra_core::BackoffConfig;
use std::time::Duration;

/// Hard ceiling on any single retry delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (0-based):
/// `min(base × factor^attempt, 30 s)`, optionally multiplied by a random
/// factor in [0.5, 1.0).
pub fn delay(config: &BackoffConfig, attempt: u32) -> Duration {
    let exp = config.base_ms as f64 * config.factor.powi(attempt as i32);
    let capped = Duration::from_millis(exp as u64).min(MAX_DELAY);
    if config.jitter {
        let factor: f64 = rand::thread_rng().gen_range(0.5..1.0);
        capped.mul_f64(factor)
    } else {
        capped
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
