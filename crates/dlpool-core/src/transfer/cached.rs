//! Cache-aware transfer: reuse a previous download when it still satisfies
//! the request.

use std::path::PathBuf;

use super::{Transfer, TransferRequest};
use crate::error::Result;

/// Wraps a transfer and returns the existing file at the request's
/// destination instead of fetching again, provided it passes the requested
/// hash check (or simply exists when no hash was requested).
#[derive(Debug, Clone, Default)]
pub struct CachedTransfer<T> {
    inner: T,
}

impl<T: Transfer> CachedTransfer<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The cached path when it satisfies `request`, `None` otherwise.
    pub fn lookup(&self, request: &TransferRequest) -> Option<PathBuf> {
        let dest = request.destination();
        if !dest.is_file() {
            return None;
        }
        match request.verify(&dest) {
            Ok(()) => Some(dest),
            Err(e) => {
                tracing::debug!("cached {} rejected: {}", dest.display(), e);
                None
            }
        }
    }
}

impl<T: Transfer> Transfer for CachedTransfer<T> {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf> {
        if let Some(path) = self.lookup(request) {
            tracing::info!("cache hit for {}: {}", request.url, path.display());
            return Ok(path);
        }
        self.inner.fetch(request)
    }
}
