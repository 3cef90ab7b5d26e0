//! Error types for the polling core.
//!
//! None of these are fatal: the poller and tailer log them and fall back to
//! their last-known or placeholder state.  Only `PollerError` is ever
//! returned to a caller, and only from `start()`.

use std::path::PathBuf;

use thiserror::Error;

/// A single outbound status fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, TLS or timeout failure.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body was not valid JSON.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The body was JSON but lacked the field we read.
    #[error("response from {url} has no `{field}`")]
    MissingField { url: String, field: &'static str },
}

/// Reading the tailed log file failed for a reason other than absence.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rejected `start()` arguments.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}
