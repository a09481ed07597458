//! Liar server settings.

use std::fs;
use std::path::Path;

use chrono::Duration;

use crate::error::ConfigError;
use crate::exchange::SNTP_PORT;

pub const DEFAULT_PORT: u16 = SNTP_PORT;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Added to the wall clock for every reply. May be negative.
    pub lying_offset: Duration,
}

impl ServerConfig {
    pub fn new<S: Into<String>>(host: S, port: u16) -> ServerConfig {
        ServerConfig {
            host: host.into(),
            port,
            lying_offset: Duration::zero(),
        }
    }

    /// Sets the offset. Fails if `seconds` exceeds what a `Duration` can hold.
    pub fn with_lying_seconds(mut self, seconds: i64) -> Result<ServerConfig, ConfigError> {
        self.lying_offset =
            Duration::try_seconds(seconds).ok_or(ConfigError::OffsetOutOfRange(seconds))?;
        Ok(self)
    }

    /// Builds a config whose offset is read from `path` (see [`read_offset_file`]).
    pub fn from_offset_file<S, P>(host: S, port: u16, path: P) -> Result<ServerConfig, ConfigError>
    where
        S: Into<String>,
        P: AsRef<Path>,
    {
        let seconds = read_offset_file(path)?;
        ServerConfig::new(host, port).with_lying_seconds(seconds)
    }

    /// `host:port`, for display.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reads a file holding a single integer number of seconds.
pub fn read_offset_file<P: AsRef<Path>>(path: P) -> Result<i64, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }
    trimmed.parse().map_err(|_| ConfigError::NotAnInteger {
        path: path.to_path_buf(),
        content: trimmed.to_string(),
    })
}
