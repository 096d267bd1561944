//! Where a download lands on disk.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Name used when nothing usable can be derived from the URL.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Suffix of in-flight temp files, removed by the rename into place.
pub const TEMP_SUFFIX: &str = ".part";

/// Extracts the last path segment from a URL for use as a filename.
///
/// Works for full URLs and for schemeless locators such as
/// `localhost/data/file.tar` (the first component is taken as the host).
/// Returns `None` for an empty/root path or a `.`/`..` segment.
pub fn filename_from_url(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let trimmed = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
            match trimmed.split_once('/') {
                Some((_host, rest)) => rest.to_string(),
                None => return None,
            }
        }
    };
    let segment = path.split('/').filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}

/// Resolve the final path for a download: an absolute `dst` is used as is,
/// a relative one is joined to `root`, and without `dst` the name comes from
/// the URL.
pub fn resolve(root: &Path, dst: Option<&Path>, url: &str) -> PathBuf {
    match dst {
        Some(dst) if dst.is_absolute() => dst.to_path_buf(),
        Some(dst) => root.join(dst),
        None => root.join(filename_from_url(url).unwrap_or_else(|| FALLBACK_FILENAME.to_string())),
    }
}

/// Create a fresh temp file beside `final_path`, named
/// `.<file name>.<random>.part`. Every call gets its own file, so transfers
/// racing for one destination never write into each other. The file is
/// deleted on drop unless persisted.
pub fn temp_file(final_path: &Path) -> io::Result<NamedTempFile> {
    let dir = match final_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    let prefix = format!(".{}.", name);

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(TEMP_SUFFIX);
    // Same mode as File::create (umask applies) instead of 0600.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
