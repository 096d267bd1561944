use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::pool::Mode;

/// Global configuration loaded from `~/.config/dlpool/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlpoolConfig {
    /// Concurrency strategy: "thread" (default), "process" or "serial".
    pub mode: Mode,
    /// Maximum concurrent jobs. Unset means unbounded threads, or one
    /// worker process per CPU.
    pub max_workers: Option<usize>,
    /// Reuse existing files that satisfy a request instead of downloading.
    pub cache: bool,
    /// Root for relative destinations (None = `~/.cache/dlpool`).
    pub download_root: Option<PathBuf>,
    /// 0 = quiet, 1 = summary, 2+ = per-job progress.
    pub verbosity: u8,
}

impl Default for DlpoolConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Thread,
            max_workers: None,
            cache: true,
            download_root: None,
            verbosity: 1,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlpool")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default download root: `$XDG_CACHE_HOME/dlpool`, created if missing.
pub fn default_download_root() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlpool")?;
    Ok(xdg_dirs.create_cache_directory("")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlpoolConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlpoolConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DlpoolConfig = toml::from_str(&data)?;
    Ok(cfg)
}
