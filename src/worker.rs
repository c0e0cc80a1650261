//! Worker logic: the code that runs inside the isolated process.
//!
//! The worker trusts nothing. It may be started by the isolation boundary,
//! by another caller, or by hand, so it repeats verification and the pixel
//! ceiling check on its own before decoding anything. Every outcome,
//! including a decoder panic, becomes one [`WorkerDocument`] plus the
//! matching exit status. There is no daemon mode and no state carried
//! between runs.

use crate::config::{DEFAULT_MAX_DIMENSION, DEFAULT_MAX_PIXELS, GateConfig};
use crate::imaging::{
    BackendError, ImageBackend, RustBackend, ThumbnailParams, within_pixel_ceiling,
};
use crate::protocol::{ENV_MAX_DIMENSION, ENV_MAX_PIXELS, USAGE, WorkerDocument};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

/// The subset of configuration the worker needs, passed through its environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_pixels: u64,
    pub max_dimension: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl From<&GateConfig> for WorkerSettings {
    fn from(config: &GateConfig) -> Self {
        Self {
            max_pixels: config.preflight.max_pixels,
            max_dimension: config.worker.max_dimension,
        }
    }
}

impl WorkerSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Missing, unparseable or zero values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_pixels: lookup(ENV_MAX_PIXELS)
                .and_then(|v| v.trim().parse().ok())
                .filter(|&v: &u64| v > 0)
                .unwrap_or(defaults.max_pixels),
            max_dimension: lookup(ENV_MAX_DIMENSION)
                .and_then(|v| v.trim().parse().ok())
                .filter(|&v: &u32| v > 0)
                .unwrap_or(defaults.max_dimension),
        }
    }

    /// Environment entries that reproduce these settings in a child process.
    pub fn to_env(&self) -> [(&'static str, String); 2] {
        [
            (ENV_MAX_PIXELS, self.max_pixels.to_string()),
            (ENV_MAX_DIMENSION, self.max_dimension.to_string()),
        ]
    }
}

/// Extract the payload path from the worker's arguments (program name excluded).
///
/// Anything other than exactly one argument is a usage error.
pub fn parse_args<I>(args: I) -> Result<PathBuf, &'static str>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(path), None) => Ok(PathBuf::from(path)),
        _ => Err(USAGE),
    }
}

/// Process the payload at `path` with the production backend.
pub fn run_worker(path: &Path, settings: &WorkerSettings) -> WorkerDocument {
    run_worker_with_backend(&RustBackend::new(), path, settings)
}

/// Process the payload at `path` with a specific backend (allows testing with mock).
pub fn run_worker_with_backend(
    backend: &impl ImageBackend,
    path: &Path,
    settings: &WorkerSettings,
) -> WorkerDocument {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read payload");
            return WorkerDocument::processing_failed(format!("cannot read payload: {e}"));
        }
    };

    match catch_unwind(AssertUnwindSafe(|| process_bytes(backend, &bytes, settings))) {
        Ok(document) => document,
        Err(_) => WorkerDocument::processing_failed("decoder panicked"),
    }
}

fn process_bytes(
    backend: &impl ImageBackend,
    bytes: &[u8],
    settings: &WorkerSettings,
) -> WorkerDocument {
    if let Err(e) = backend.verify(bytes) {
        return verify_failure_document(e);
    }

    // Past verification the format is known; any later error is a processing failure.
    let header = match backend.read_header(bytes) {
        Ok(header) => header,
        Err(e) => return WorkerDocument::processing_failed(e.to_string()),
    };
    if !within_pixel_ceiling(header.dimensions, settings.max_pixels) {
        return WorkerDocument::processing_failed(format!(
            "image {} exceeds pixel ceiling of {}",
            header.dimensions, settings.max_pixels
        ));
    }

    let params = ThumbnailParams::new(settings.max_dimension, settings.max_pixels);
    match backend.thumbnail(bytes, &params) {
        Ok(result) => {
            tracing::debug!(size = %result.size, "thumbnail derived");
            WorkerDocument::Success(result)
        }
        Err(e) => WorkerDocument::processing_failed(e.to_string()),
    }
}

/// Document for a failed verification.
fn verify_failure_document(error: BackendError) -> WorkerDocument {
    match error {
        BackendError::UnrecognizedFormat => WorkerDocument::unrecognized(),
        other => WorkerDocument::processing_failed(other.to_string()),
    }
}
