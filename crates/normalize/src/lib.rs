// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sentra-normalize: vendor payloads in, canonical records out.
//!
//! The normalizer is pure with respect to storage: it maps one vendor-shaped
//! input into zero or one [`sentra_core::Alert`] and zero or one
//! [`sentra_core::ThreatIntel`], preserving the original payload under
//! `metadata.originalData`. Persistence and fan-out happen in the caller.

mod ai;
mod ioc;
mod normalizer;
mod path;
mod rules;
mod severity;

pub use ai::{AiParsed, FallbackParser, NoFallback};
pub use ioc::extract_iocs;
pub use normalizer::{NormalizeContext, Normalized, Normalizer, NormalizerStats};
pub use path::get_path;
pub use rules::{FieldRule, Transform, VendorRules};
pub use severity::map_severity;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("required field `{0}` missing from payload")]
    MissingRequired(String),

    #[error("payload is not an object or array")]
    UnsupportedShape,
}
