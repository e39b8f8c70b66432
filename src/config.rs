//! Run configuration, loaded from a TOML file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Configuration file problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Service configuration. Every field is defaulted, so an absent file or
/// a partial one runs the stock setup; unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Unix-socket path the session server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Capture devices to bind, in order.
    #[serde(default = "default_devices")]
    pub devices: Vec<PathBuf>,
    /// Frame width in pixels; must be even for packed YUYV.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Requested capture rate in frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// How many capture polls to make before giving a frame up.
    #[serde(default = "default_capture_attempts")]
    pub capture_attempts: u32,
    /// Pause between capture polls, in milliseconds.
    #[serde(default = "default_capture_retry_ms")]
    pub capture_retry_ms: u64,
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/visiond.sock")
}

fn default_devices() -> Vec<PathBuf> {
    vec![PathBuf::from("/dev/video0"), PathBuf::from("/dev/video1")]
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    15
}

fn default_capture_attempts() -> u32 {
    100
}

fn default_capture_retry_ms() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            devices: default_devices(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            capture_attempts: default_capture_attempts(),
            capture_retry_ms: default_capture_retry_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads the configuration at `path`. A missing file yields the
    /// defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        };
        Ok(toml::from_str(&text)?)
    }

    /// Pause between capture polls.
    pub fn capture_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture_retry_ms)
    }
}
