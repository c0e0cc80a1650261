//! Gate configuration.
//!
//! Loaded once at startup from an optional TOML file and read-only after
//! that. The same values are shared by every request; nothing here is
//! mutated at runtime.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [preflight]
//! max_pixels = 50000000       # width × height ceiling (decompression bombs)
//!
//! [worker]
//! timeout_secs = 6            # hard wall-clock limit per worker
//! max_dimension = 512         # longest edge of the derived thumbnail
//! max_output_bytes = 65536    # captured stdout/stderr per channel
//! # program = "/usr/local/libexec/pixelgate-worker"
//! # staging_dir = "/var/tmp/pixelgate"
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.
//!
//! The worker never reads this file. The parent hands it the values it needs
//! (pixel ceiling, max dimension) through its environment at spawn time; see
//! [`protocol`](crate::protocol).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;
/// Upper bound on `worker.timeout_secs` (one hour).
pub const MAX_TIMEOUT_SECS: u64 = 60 * 60;
pub const DEFAULT_MAX_DIMENSION: u32 = 512;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// In-process gate settings.
    pub preflight: PreflightConfig,
    /// Isolated worker settings.
    pub worker: WorkerConfig,
}

impl GateConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preflight.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "preflight.max_pixels must be non-zero".into(),
            ));
        }
        if self.worker.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "worker.timeout_secs must be non-zero".into(),
            ));
        }
        if self.worker.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "worker.timeout_secs must be at most {MAX_TIMEOUT_SECS}"
            )));
        }
        if self.worker.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "worker.max_dimension must be non-zero".into(),
            ));
        }
        if self.worker.max_output_bytes == 0 {
            return Err(ConfigError::Validation(
                "worker.max_output_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Preflight checker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreflightConfig {
    /// Maximum permitted `width × height`.
    pub max_pixels: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// Isolation boundary and worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Wall-clock limit for one worker run, in seconds.
    pub timeout_secs: u64,
    /// Neither edge of the derived artifact may exceed this.
    pub max_dimension: u32,
    /// Bytes captured per output channel; the rest is drained and dropped.
    pub max_output_bytes: usize,
    /// Worker executable. When absent, `pixelgate-worker` next to the running binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    /// Where payloads are staged. When absent, the system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            program: None,
            staging_dir: None,
        }
    }
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, or stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    match path {
        Some(path) => parse_config(&fs::read_to_string(path)?),
        None => Ok(GateConfig::default()),
    }
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixelgate configuration
# =======================
# All keys are optional; omitted keys keep the defaults shown here.
# Unknown keys are rejected.

[preflight]
# Maximum width × height admitted past the in-process check. Inputs whose
# header declares more pixels are rejected before any decoding happens.
max_pixels = 50000000

[worker]
# Hard wall-clock limit for one worker run. On expiry the worker is killed
# and the request fails with a timeout. At most 3600.
timeout_secs = 6

# Longest edge of the derived thumbnail, in pixels. Never upscales.
max_dimension = 512

# Bytes captured from each of the worker's stdout and stderr. Output past
# this is drained and discarded.
max_output_bytes = 65536

# Worker executable. Defaults to `pixelgate-worker` next to this binary.
# program = "/usr/local/libexec/pixelgate-worker"

# Directory for staged payloads. Defaults to the system temp directory.
# staging_dir = "/var/tmp/pixelgate"
"##
}
