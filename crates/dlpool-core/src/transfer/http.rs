//! Single-stream GET via libcurl.
//!
//! The body goes to a private `.<name>.<random>.part` file beside the
//! destination; after an optional hash check it is renamed into place, so a
//! destination path only ever holds a complete, verified file. Transfers
//! racing for the same destination each write their own temp file and the
//! last rename wins.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Transfer, TransferRequest};
use crate::destination;
use crate::error::{Error, Result};

/// Plain HTTP(S) transfer. Always downloads; see `CachedTransfer` for reuse.
#[derive(Debug, Clone, Copy)]
pub struct CurlTransfer {
    pub connect_timeout: Duration,
    /// Abort when slower than 1 KiB/s for this long.
    pub low_speed_time: Duration,
    pub timeout: Duration,
    pub max_redirections: u32,
}

impl Default for CurlTransfer {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(3600),
            max_redirections: 10,
        }
    }
}

impl CurlTransfer {
    /// GET `url` into `file` (open at `path`), returning the number of bytes
    /// written.
    fn download_to(&self, url: &str, file: &mut File, path: &Path) -> Result<u64> {
        let curl_err = |e: ::curl::Error| Error::transfer(url, e);

        let mut written = 0u64;
        let mut write_error: Option<io::Error> = None;

        let mut easy = ::curl::easy::Easy::new();
        easy.url(url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(self.max_redirections).map_err(curl_err)?;
        easy.connect_timeout(self.connect_timeout).map_err(curl_err)?;
        easy.low_speed_limit(1024).map_err(curl_err)?;
        easy.low_speed_time(self.low_speed_time).map_err(curl_err)?;
        easy.timeout(self.timeout).map_err(curl_err)?;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match file.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        write_error = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(curl_err)?;
            transfer.perform()
        };
        if let Some(e) = write_error {
            return Err(Error::transfer(url, format!("write {}: {}", path.display(), e)));
        }
        performed.map_err(curl_err)?;

        // 0 for protocols without a status line (file://).
        let code = easy.response_code().map_err(curl_err)?;
        if code != 0 && !(200..300).contains(&code) {
            return Err(Error::transfer(url, format!("HTTP {}", code)));
        }

        file.sync_all()
            .map_err(|e| Error::transfer(url, format!("sync {}: {}", path.display(), e)))?;
        Ok(written)
    }
}

impl Transfer for CurlTransfer {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf> {
        let url = request.url.as_str();
        let dest = request.destination();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::transfer(url, format!("create {}: {}", parent.display(), e)))?;
        }
        let mut part = destination::temp_file(&dest)
            .map_err(|e| Error::transfer(url, format!("create temp file for {}: {}", dest.display(), e)))?;

        if request.verbosity > 0 {
            tracing::info!("downloading {} to {}", url, dest.display());
        } else {
            tracing::debug!("downloading {} to {}", url, dest.display());
        }

        // Early returns drop `part`, which deletes the temp file.
        let part_path = part.path().to_path_buf();
        let bytes = self.download_to(url, part.as_file_mut(), &part_path)?;
        if let Err(e) = request.verify(&part_path) {
            return Err(match e {
                // Report the name the caller asked for, not the temp file.
                Error::Verification { hasher, expected, actual, .. } => Error::Verification {
                    path: dest,
                    hasher,
                    expected,
                    actual,
                },
                other => other,
            });
        }
        part.persist(&dest).map_err(|e| {
            Error::transfer(url, format!("rename {} into place: {}", part_path.display(), e.error))
        })?;

        tracing::debug!(bytes, "downloaded {}", dest.display());
        Ok(dest)
    }
}
