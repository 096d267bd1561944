//! Transfer functions: fetch one URL to a local file.
//!
//! The scheduler only sees the [`Transfer`] trait. [`CurlTransfer`] does the
//! real work; [`CachedTransfer`] wraps any transfer and short-circuits when a
//! previous download already satisfies the request.

mod cached;
mod http;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::destination;
use crate::error::{Error, Result};
use crate::hash::{self, Hasher};

pub use http::CurlTransfer;
pub use cached::CachedTransfer;

/// Everything a transfer needs to know about one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub url: String,
    pub download_root: PathBuf,
    /// Relative (to `download_root`) or absolute destination; derived from
    /// the URL when absent.
    pub dst: Option<PathBuf>,
    pub hash_prefix: Option<String>,
    pub hasher: Hasher,
    pub verbosity: u8,
}

impl TransferRequest {
    /// Final on-disk location for this request.
    pub fn destination(&self) -> PathBuf {
        destination::resolve(&self.download_root, self.dst.as_deref(), &self.url)
    }

    /// Check `path` against `hash_prefix`, if one was requested. Read
    /// failures are reported as transfer errors.
    pub fn verify(&self, path: &Path) -> Result<()> {
        let Some(expected) = self.hash_prefix.as_deref() else {
            return Ok(());
        };
        let actual = self
            .hasher
            .digest_path(path)
            .map_err(|e| Error::transfer(&self.url, format!("hash {}: {}", path.display(), e)))?;
        if hash::matches_prefix(&actual, expected) {
            Ok(())
        } else {
            Err(Error::Verification {
                path: path.to_path_buf(),
                hasher: self.hasher.name().to_string(),
                expected: expected.trim().to_string(),
                actual,
            })
        }
    }
}

/// Fetches a request's URL and returns the local path of the result.
pub trait Transfer: Send + Sync {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf>;
}

impl<T: Transfer + ?Sized> Transfer for Arc<T> {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf> {
        (**self).fetch(request)
    }
}

impl<T: Transfer + ?Sized> Transfer for Box<T> {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf> {
        (**self).fetch(request)
    }
}
