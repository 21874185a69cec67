//! Host configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HANDLER: &str = "handler.handler";
pub const DEFAULT_CODE_PATH: &str = "/function/code";

/// Configuration for the function host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Entry-point specifier, `<module>.<export>`.
    pub handler: String,
    /// Location of the handler library.
    pub code_path: PathBuf,
    /// Informational function name.
    pub function_name: Option<String>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Per-invocation timeout in seconds, 0 disables it.
    pub request_timeout: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            handler: DEFAULT_HANDLER.to_string(),
            code_path: PathBuf::from(DEFAULT_CODE_PATH),
            function_name: None,
            max_body_size: 10 * 1024 * 1024, // 10MB
            request_timeout: 30,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl HostConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or empty keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(handler) = get("FUNCTION_HANDLER") {
            config.handler = handler;
        }
        if let Some(path) = get("FUNCTION_CODE_PATH") {
            config.code_path = PathBuf::from(path);
        }
        config.function_name = get("FUNCTION_NAME");
        if let Some(size) = get("FUNCTION_MAX_BODY_SIZE") {
            config.max_body_size = parse("FUNCTION_MAX_BODY_SIZE", &size)?;
        }
        if let Some(timeout) = get("FUNCTION_TIMEOUT") {
            config.request_timeout = parse("FUNCTION_TIMEOUT", &timeout)?;
        }

        Ok(config)
    }

    /// Set the host address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the entry-point specifier.
    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    /// Set the handler library location.
    pub fn code_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.code_path = path.into();
        self
    }

    /// Set the per-invocation timeout in seconds.
    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = secs;
        self
    }

    /// Set the maximum request body size.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.request_timeout > 0).then(|| Duration::from_secs(self.request_timeout))
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
