//! Error type shared by the pool, the scheduler and the transfer functions.
//!
//! Errors are `Clone` so a finished job can hand the same failure out on
//! every `result()` call, and serde-friendly so a worker process can send
//! them back to its parent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across `dlpool-core`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Error {
    /// The pool no longer accepts work (submit after shutdown).
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Network or I/O failure while fetching `url`.
    #[error("transfer of {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    /// The downloaded file's digest does not start with the requested prefix.
    #[error("hash mismatch for {}: expected {hasher} prefix {expected}, got {actual}", path.display())]
    Verification {
        path: PathBuf,
        hasher: String,
        expected: String,
        actual: String,
    },

    /// The job was cancelled by a pool shutdown before it produced a result.
    #[error("job cancelled before completion")]
    Cancelled,

    /// A request was rejected before it was scheduled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A task panicked, or a worker process died or spoke garbage.
    #[error("worker failure: {0}")]
    Worker(String),
}

impl Error {
    pub(crate) fn transfer(url: &str, reason: impl std::fmt::Display) -> Self {
        Error::Transfer {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for the kinds the caller may reasonably try again (network/I/O).
    pub fn is_transfer(&self) -> bool {
        matches!(self, Error::Transfer { .. })
    }
}
