//! Configuration module for the telemetry proxy.
//!
//! The proxy is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [forwarding]
//! enabled = true
//! default_site = "datadoghq.com"
//!
//! [secondary]
//! endpoint = "https://otel.example.com/v1/logs"
//! token = "${COLLECTOR_TOKEN}"
//! ```

mod forwarding;
mod observability;
mod server;

use std::path::Path;

pub use forwarding::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the proxy.
///
/// Every section is optional with defaults, so an empty file yields a
/// working passthrough-only proxy for the default site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Deployment environment label reported by the health endpoint.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Primary (vendor passthrough) forwarding and the kill-switch.
    #[serde(default)]
    pub forwarding: ForwardingConfig,

    /// Secondary OTLP collector. Omit to disable the secondary sink.
    #[serde(default)]
    pub secondary: SecondaryConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            forwarding: ForwardingConfig::default(),
            secondary: SecondaryConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
}

impl ProxyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let config: ProxyConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.trim().is_empty() {
            return Err(ConfigError::Validation(
                "environment must not be empty".into(),
            ));
        }

        self.server.validate().map_err(ConfigError::Validation)?;
        self.forwarding.validate().map_err(ConfigError::Validation)?;
        self.secondary.validate().map_err(ConfigError::Validation)?;

        Ok(())
    }

    /// Valid but noteworthy settings, to be logged once tracing is up.
    pub fn startup_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !self.forwarding.enabled {
            warnings.push(
                "Forwarding is disabled (forwarding.enabled = false). \
                 Proxy requests will be acknowledged with 200 OK and dropped.",
            );
        }
        warnings
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex is valid");
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
