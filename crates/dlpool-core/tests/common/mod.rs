#![allow(dead_code)]

pub mod static_server;

use std::fs;
use std::path::{Path, PathBuf};

/// In-flight temp files (`*.part`) directly under `dir`.
pub fn part_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.to_string_lossy().ends_with(".part"))
        .collect()
}
