use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::routing::builtin_site_origin;

/// Primary sink configuration: vendor intake forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingConfig {
    /// Kill-switch. When false, proxy requests are acknowledged with
    /// `200 OK` and neither sink runs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Site used when neither the `site` query parameter nor the site
    /// header is present.
    #[serde(default = "default_site")]
    pub default_site: String,

    /// Request header consulted for the site after the query parameter.
    #[serde(default = "default_site_header")]
    pub site_header: String,

    /// Additional or overriding site -> intake origin entries.
    ///
    /// Merged over the built-in table, e.g. to point a site at a local
    /// intake mock.
    #[serde(default)]
    pub sites: BTreeMap<String, String>,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_site: default_site(),
            site_header: default_site_header(),
            sites: BTreeMap::new(),
        }
    }
}

impl ForwardingConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        for (site, origin) in &self.sites {
            validate_http_url(origin)
                .map_err(|e| format!("forwarding.sites.\"{site}\": {e}"))?;
        }

        if !self.sites.contains_key(&self.default_site)
            && builtin_site_origin(&self.default_site).is_none()
        {
            return Err(format!(
                "forwarding.default_site '{}' is not a known site; add it to [forwarding.sites]",
                self.default_site
            ));
        }

        if http::HeaderName::try_from(self.site_header.as_str()).is_err() {
            return Err(format!(
                "forwarding.site_header '{}' is not a valid header name",
                self.site_header
            ));
        }

        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_site() -> String {
    "datadoghq.com".to_string()
}

fn default_site_header() -> String {
    "X-Datadog-Site".to_string()
}

/// Secondary sink configuration: OTLP/JSON logs collector.
///
/// Both `endpoint` and `token` must be set to enable the sink; leaving both
/// out disables it silently.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryConfig {
    /// Collector logs endpoint (e.g. `https://otel.example.com/v1/logs`).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer credential sent as `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl std::fmt::Debug for SecondaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A fully configured secondary collector.
#[derive(Clone)]
pub struct CollectorTarget {
    pub endpoint: Url,
    pub token: String,
}

impl std::fmt::Debug for CollectorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorTarget")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl SecondaryConfig {
    /// Returns the collector target if the secondary sink is configured.
    pub fn collector(&self) -> Option<CollectorTarget> {
        let endpoint = self.endpoint.as_deref()?;
        let token = self.token.as_deref()?;
        Some(CollectorTarget {
            endpoint: Url::parse(endpoint).ok()?,
            token: token.to_string(),
        })
    }

    /// Whether the secondary sink will be attempted.
    pub fn is_configured(&self) -> bool {
        self.collector().is_some()
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        match (self.endpoint.as_deref(), self.token.as_deref()) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(
                "secondary.endpoint is set but secondary.token is missing".to_string(),
            ),
            (None, Some(_)) => Err(
                "secondary.token is set but secondary.endpoint is missing".to_string(),
            ),
            (Some(endpoint), Some(token)) => {
                validate_http_url(endpoint).map_err(|e| format!("secondary.endpoint: {e}"))?;
                if token.trim().is_empty() {
                    return Err("secondary.token must not be empty".to_string());
                }
                Ok(())
            }
        }
    }
}

fn validate_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL '{value}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{other}' in '{value}'")),
    }
}
