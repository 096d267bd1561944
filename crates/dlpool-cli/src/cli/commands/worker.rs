//! `dlpool worker` – child side of the process strategy.

use anyhow::Result;

pub fn run_worker() -> Result<()> {
    dlpool_core::scheduler::serve_download_worker()
}
