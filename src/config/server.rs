use std::{net::IpAddr, time::Duration};

use http::{HeaderName, HeaderValue, header};
use serde::{Deserialize, Serialize};

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Inbound request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// CORS headers stamped on every response.
    #[serde(default)]
    pub cors: CorsConfig,

    /// HTTP client configuration for outbound requests to both sinks.
    #[serde(default)]
    pub http_client: HttpClientConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            cors: CorsConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }
}

impl ServerConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be greater than 0".to_string());
        }
        self.cors.header_set()?;
        if HeaderValue::try_from(self.http_client.user_agent.as_str()).is_err() {
            return Err(format!(
                "server.http_client.user_agent '{}' is not a valid header value",
                self.http_client.user_agent
            ));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    5 * 1024 * 1024 // 5 MB
}

/// CORS configuration.
///
/// Unlike a negotiating CORS layer, the proxy answers every response with
/// the same fixed header set, so browser SDKs on any page can post to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// `Access-Control-Allow-Origin` value.
    #[serde(default = "default_cors_origin")]
    pub allow_origin: String,

    /// `Access-Control-Allow-Methods` values.
    #[serde(default = "default_cors_methods")]
    pub allow_methods: Vec<String>,

    /// `Access-Control-Allow-Headers` values.
    #[serde(default = "default_cors_headers")]
    pub allow_headers: Vec<String>,

    /// `Access-Control-Max-Age` in seconds.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_cors_origin(),
            allow_methods: default_cors_methods(),
            allow_headers: default_cors_headers(),
            max_age_secs: default_cors_max_age(),
        }
    }
}

impl CorsConfig {
    /// Build the header set stamped on every response.
    pub fn header_set(&self) -> Result<Vec<(HeaderName, HeaderValue)>, String> {
        let value = |name: &str, raw: String| {
            HeaderValue::try_from(raw.as_str())
                .map_err(|_| format!("server.cors.{name} '{raw}' is not a valid header value"))
        };

        Ok(vec![
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                value("allow_origin", self.allow_origin.clone())?,
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                value("allow_methods", self.allow_methods.join(", "))?,
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                value("allow_headers", self.allow_headers.join(", "))?,
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                value("max_age_secs", self.max_age_secs.to_string())?,
            ),
        ])
    }
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET", "POST", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cors_headers() -> Vec<String> {
    vec!["Content-Type", "X-Datadog-Site"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_cors_max_age() -> u64 {
    86400 // 24 hours
}

/// HTTP client configuration for outbound requests.
///
/// A single `reqwest::Client` is shared by both sinks; reqwest keeps a
/// separate connection pool per host, so the vendor intake and the collector
/// never compete for connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpClientConfig {
    /// Total time allowed for one outbound call, including connect.
    #[serde(default = "default_http_client_timeout")]
    pub timeout_secs: u64,

    /// Time allowed to establish a connection.
    #[serde(default = "default_http_client_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum idle connections to keep per host.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout in seconds.
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    /// User-Agent sent when the inbound caller provided none.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_client_timeout(),
            connect_timeout_secs: default_http_client_connect_timeout(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpClientConfig {
    /// Build a reqwest Client from this configuration.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .user_agent(&self.user_agent)
            .build()
    }
}

fn default_http_client_timeout() -> u64 {
    30
}

fn default_http_client_connect_timeout() -> u64 {
    10
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_user_agent() -> String {
    format!("telemetry-fanout/{}", env!("CARGO_PKG_VERSION"))
}
