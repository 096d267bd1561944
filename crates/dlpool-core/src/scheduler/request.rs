//! Caller-facing download request.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::Hasher;

/// One download: where from, where to, and how to check it.
///
/// Deserializable so manifests can list requests directly:
///
/// ```toml
/// [[download]]
/// url = "https://example.com/data.tar.gz"
/// dst = "data.tar.gz"
/// hash_prefix = "31a129618c87"
/// hasher = "sha256"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    /// Relative (to the download root) or absolute path. Derived from the
    /// URL when absent.
    #[serde(default)]
    pub dst: Option<PathBuf>,
    /// The file's digest must start with this (case-insensitive).
    #[serde(default)]
    pub hash_prefix: Option<String>,
    #[serde(default)]
    pub hasher: Hasher,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dst: None,
            hash_prefix: None,
            hasher: Hasher::default(),
        }
    }

    pub fn dst(mut self, dst: impl Into<PathBuf>) -> Self {
        self.dst = Some(dst.into());
        self
    }

    pub fn hash_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hash_prefix = Some(prefix.into());
        self
    }

    pub fn hasher(mut self, hasher: Hasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Reject requests that can never succeed.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::InvalidRequest("url must not be empty".into()));
        }
        if let Some(prefix) = &self.hash_prefix {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return Err(Error::InvalidRequest("hash_prefix must not be empty".into()));
            }
            if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidRequest(format!(
                    "hash_prefix '{}' is not hexadecimal",
                    prefix
                )));
            }
        }
        if let Some(dst) = &self.dst {
            if dst.as_os_str().is_empty() {
                return Err(Error::InvalidRequest("dst must not be empty".into()));
            }
        }
        Ok(())
    }
}
