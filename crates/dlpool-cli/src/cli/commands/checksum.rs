//! `dlpool checksum` – digest a file.

use anyhow::{bail, Context, Result};
use dlpool_core::hash::{self, Hasher};
use std::path::Path;

/// Print `<digest>  <path>`; with `expect`, fail on a prefix mismatch.
pub fn run_checksum(path: &Path, hasher: Hasher, expect: Option<&str>) -> Result<()> {
    let digest = hasher
        .digest_path(path)
        .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    if let Some(prefix) = expect {
        if !hash::matches_prefix(&digest, prefix) {
            bail!("{} digest does not start with {}", hasher, prefix.trim());
        }
    }
    Ok(())
}
