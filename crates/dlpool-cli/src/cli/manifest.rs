//! Download manifests: a TOML list of requests.
//!
//! ```toml
//! [[download]]
//! url = "https://example.com/a.iso"
//! dst = "isos/a.iso"
//! hash_prefix = "9f86d081"
//! hasher = "sha256"
//! ```

use anyhow::{Context, Result};
use dlpool_core::scheduler::DownloadRequest;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    download: Vec<DownloadRequest>,
}

pub fn parse(text: &str) -> Result<Vec<DownloadRequest>> {
    let manifest: Manifest = toml::from_str(text)?;
    Ok(manifest.download)
}

pub fn load(path: &Path) -> Result<Vec<DownloadRequest>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read manifest {}", path.display()))?;
    parse(&text).with_context(|| format!("parse manifest {}", path.display()))
}
