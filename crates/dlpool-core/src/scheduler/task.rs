//! The pool task behind each scheduled download.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::pool::{self, RemoteTask, Task};
use crate::transfer::{CachedTransfer, CurlTransfer, Transfer, TransferRequest};

/// A transfer request bound to the scheduler's transfer function.
pub struct DownloadTask {
    pub(crate) request: TransferRequest,
    pub(crate) cache: bool,
    pub(crate) transfer: Arc<dyn Transfer>,
}

impl Task for DownloadTask {
    type Output = PathBuf;

    fn run(self) -> Result<PathBuf> {
        self.transfer.fetch(&self.request)
    }
}

/// What a worker process receives. The child uses its own libcurl
/// transfer, cache-aware when `cache` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub request: TransferRequest,
    pub cache: bool,
}

impl RemoteTask for DownloadTask {
    type Payload = WorkerRequest;

    fn payload(&self) -> WorkerRequest {
        WorkerRequest {
            request: self.request.clone(),
            cache: self.cache,
        }
    }
}

/// Entry point for `dlpool worker`: serve one [`WorkerRequest`] over
/// stdin/stdout.
pub fn serve_download_worker() -> anyhow::Result<()> {
    pool::serve_worker(|work: WorkerRequest| {
        tracing::debug!(url = %work.request.url, cache = work.cache, "worker fetching");
        let curl = CurlTransfer::default();
        if work.cache {
            CachedTransfer::new(curl).fetch(&work.request)
        } else {
            curl.fetch(&work.request)
        }
    })
}
