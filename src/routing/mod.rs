//! Request classification and intake site resolution.
//!
//! Classification precedence:
//! 1. `OPTIONS` on any path is a CORS preflight
//! 2. `/health`
//! 3. `POST` with a `ddforward` query parameter
//! 4. `POST` to a legacy intake path (`/api/v2/*`, `/v1/input/*`)
//! 5. anything else is not found
//!
//! Sites map to browser intake origins through a built-in table that
//! configuration can extend or override.

use std::collections::BTreeMap;

use http::{HeaderMap, HeaderName, Method, Uri};
use url::{Url, form_urlencoded};

use crate::config::ForwardingConfig;

/// Query parameter carrying the URL-encoded intake path and query.
pub const FORWARD_PARAM: &str = "ddforward";

/// Query parameter selecting the intake site.
pub const SITE_PARAM: &str = "site";

pub const HEALTH_PATH: &str = "/health";

const LEGACY_PREFIXES: [&str; 2] = ["/api/v2/", "/v1/input/"];

const BUILTIN_SITES: [(&str, &str); 7] = [
    ("datadoghq.com", "https://browser-intake-datadoghq.com"),
    ("us3.datadoghq.com", "https://browser-intake-us3-datadoghq.com"),
    ("us5.datadoghq.com", "https://browser-intake-us5-datadoghq.com"),
    ("datadoghq.eu", "https://browser-intake-datadoghq.eu"),
    ("ap1.datadoghq.com", "https://browser-intake-ap1-datadoghq.com"),
    ("ap2.datadoghq.com", "https://browser-intake-ap2-datadoghq.com"),
    ("ddog-gov.com", "https://browser-intake-ddog-gov.com"),
];

/// Built-in intake origin for a site, if the site is known.
pub fn builtin_site_origin(site: &str) -> Option<&'static str> {
    BUILTIN_SITES
        .iter()
        .find(|(name, _)| *name == site)
        .map(|(_, origin)| *origin)
}

/// What an inbound request is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    Preflight,
    Health,
    /// Forward to the intake. `target` is the decoded, not yet validated
    /// path+query to request on the intake origin.
    Proxy { target: String },
    NotFound,
}

/// Classify a request by method and URI.
pub fn classify(method: &Method, uri: &Uri) -> RouteClass {
    if method == Method::OPTIONS {
        return RouteClass::Preflight;
    }

    let path = uri.path();
    if path == HEALTH_PATH {
        return RouteClass::Health;
    }

    if method != Method::POST {
        return RouteClass::NotFound;
    }

    if let Some(target) = query_param(uri.query(), FORWARD_PARAM) {
        return RouteClass::Proxy { target };
    }

    if LEGACY_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        let target = match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        return RouteClass::Proxy { target };
    }

    RouteClass::NotFound
}

/// First decoded value of a query parameter.
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Validate a forward target: it must be an absolute path on the intake
/// origin, never a scheme-relative or absolute URL.
pub fn validate_forward_target(target: &str) -> Result<&str, RoutingError> {
    let valid = target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_control() || c.is_whitespace());

    if valid {
        Ok(target)
    } else {
        Err(RoutingError::InvalidForwardTarget(target.to_string()))
    }
}

/// Site -> intake origin table with request-level site selection.
#[derive(Debug, Clone)]
pub struct SiteTable {
    overrides: BTreeMap<String, String>,
    default_site: String,
    site_header: Option<HeaderName>,
}

impl SiteTable {
    pub fn from_config(config: &ForwardingConfig) -> Self {
        Self {
            overrides: config
                .sites
                .iter()
                .map(|(site, origin)| (site.clone(), origin.trim_end_matches('/').to_string()))
                .collect(),
            default_site: config.default_site.clone(),
            site_header: HeaderName::try_from(config.site_header.as_str()).ok(),
        }
    }

    /// Origin for a site: configured overrides first, then the built-in table.
    pub fn origin(&self, site: &str) -> Option<&str> {
        self.overrides
            .get(site)
            .map(String::as_str)
            .or_else(|| builtin_site_origin(site))
    }

    /// Pick the site for a request: `site` query parameter, then the site
    /// header, then the configured default.
    pub fn select_site(&self, query: Option<&str>, headers: &HeaderMap) -> String {
        if let Some(site) = query_param(query, SITE_PARAM).filter(|s| !s.is_empty()) {
            return site;
        }

        if let Some(name) = &self.site_header
            && let Some(site) = headers.get(name).and_then(|v| v.to_str().ok())
            && !site.trim().is_empty()
        {
            return site.trim().to_string();
        }

        self.default_site.clone()
    }

    /// Full intake URL for a site and validated target.
    pub fn intake_url(&self, site: &str, target: &str) -> Result<Url, RoutingError> {
        let origin = self
            .origin(site)
            .ok_or_else(|| RoutingError::UnknownSite(site.to_string()))?;
        let target = validate_forward_target(target)?;

        Url::parse(&format!("{origin}{target}"))
            .map_err(|_| RoutingError::InvalidForwardTarget(target.to_string()))
    }
}

/// Error when routing a proxied request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// The site has no known intake origin.
    #[error("Unknown site '{0}'")]
    UnknownSite(String),
    /// The forward target is not an absolute path.
    #[error("Invalid forward target '{0}': must be an absolute path")]
    InvalidForwardTarget(String),
}
