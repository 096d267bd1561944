//! File digests for hash-prefix verification.
//!
//! Files are read in chunks so memory stays bounded for large downloads.

use serde::{Deserialize, Serialize};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hasher {
    Md5,
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl Hasher {
    pub const ALL: [Hasher; 7] = [
        Hasher::Md5,
        Hasher::Sha1,
        Hasher::Sha224,
        Hasher::Sha256,
        Hasher::Sha384,
        Hasher::Sha512,
        Hasher::Blake3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hasher::Md5 => "md5",
            Hasher::Sha1 => "sha1",
            Hasher::Sha224 => "sha224",
            Hasher::Sha256 => "sha256",
            Hasher::Sha384 => "sha384",
            Hasher::Sha512 => "sha512",
            Hasher::Blake3 => "blake3",
        }
    }

    /// Lowercase hex digest of everything `reader` yields.
    pub fn digest_reader(self, reader: impl Read) -> io::Result<String> {
        match self {
            Hasher::Md5 => digest_hex::<Md5>(reader),
            Hasher::Sha1 => digest_hex::<Sha1>(reader),
            Hasher::Sha224 => digest_hex::<Sha224>(reader),
            Hasher::Sha256 => digest_hex::<Sha256>(reader),
            Hasher::Sha384 => digest_hex::<Sha384>(reader),
            Hasher::Sha512 => digest_hex::<Sha512>(reader),
            Hasher::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                pump(reader, |chunk| {
                    hasher.update(chunk);
                })?;
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }

    /// Lowercase hex digest of the file at `path`.
    pub fn digest_path(self, path: &Path) -> io::Result<String> {
        self.digest_reader(File::open(path)?)
    }
}

impl fmt::Display for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hasher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "");
        Hasher::ALL
            .into_iter()
            .find(|h| h.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Hasher::ALL.iter().map(|h| h.name()).collect();
                format!(
                    "unsupported hasher '{}' (expected one of: {})",
                    s,
                    names.join(", ")
                )
            })
    }
}

fn digest_hex<D: Digest>(reader: impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    pump(reader, |chunk| hasher.update(chunk))?;
    Ok(hex::encode(hasher.finalize()))
}

fn pump(mut reader: impl Read, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sink(&buf[..n]);
    }
}

/// True when `digest` starts with `prefix`, ignoring ASCII case.
pub fn matches_prefix(digest: &str, prefix: &str) -> bool {
    let prefix = prefix.trim();
    digest.len() >= prefix.len()
        && digest.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
