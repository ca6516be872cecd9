// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connector error taxonomy (see the handling matrix in the daemon crate).

use sentra_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid configuration; surfaced at `start()`, no retry.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Credentials missing, incomplete, or undecryptable.
    #[error("credentials: {0}")]
    Credentials(String),

    /// Listener could not bind its address.
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS setup or handshake machinery failure.
    #[error("tls: {0}")]
    Tls(String),

    /// Transport-level HTTP failure after retries were exhausted.
    #[error("http: {0}")]
    Http(String),

    /// The work queue rejected a batch; counts as a cycle failure.
    #[error("work queue full")]
    QueueFull,

    /// Operation attempted in a state that forbids it.
    #[error("connector is {0}")]
    InvalidState(sentra_core::ConnectorStatus),

    /// Corrupt internal state; the connector goes straight to `error`.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
