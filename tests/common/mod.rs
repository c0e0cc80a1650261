//! Inputs and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

// Same synthetic-image builders the unit tests use.
#[path = "../../src/test_helpers.rs"]
mod test_helpers;

pub use test_helpers::*;

/// Path of the worker binary built alongside these tests.
pub fn worker_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pixelgate-worker"))
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
