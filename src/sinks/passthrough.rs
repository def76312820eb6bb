use std::net::IpAddr;

use async_trait::async_trait;
use http::{
    HeaderMap, HeaderValue,
    header::{CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT},
};

use super::{Delivery, Sink, SinkError, SinkResponse};

/// Content type sent to the intake when the caller supplied none.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// Inbound request metadata that may be forwarded to the intake.
///
/// This is an allow-list: cookies, credentials and every other inbound header
/// never leave the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeaders {
    pub content_type: Option<HeaderValue>,
    pub user_agent: Option<HeaderValue>,
    pub origin: Option<HeaderValue>,
    pub referer: Option<HeaderValue>,
    pub client_ip: Option<IpAddr>,
}

impl ForwardedHeaders {
    /// Pick the forwardable metadata out of the inbound headers.
    pub fn from_inbound(headers: &HeaderMap, client_ip: Option<IpAddr>) -> Self {
        Self {
            content_type: headers.get(CONTENT_TYPE).cloned(),
            user_agent: headers.get(USER_AGENT).cloned(),
            origin: headers.get(ORIGIN).cloned(),
            referer: headers.get(REFERER).cloned(),
            client_ip,
        }
    }

    /// Outbound header map for the intake request.
    ///
    /// `User-Agent` is only set when the caller sent one; the HTTP client
    /// supplies the configured agent otherwise.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(5);
        headers.insert(
            CONTENT_TYPE,
            self.content_type
                .clone()
                .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
        );
        if let Some(ua) = &self.user_agent {
            headers.insert(USER_AGENT, ua.clone());
        }
        if let Some(origin) = &self.origin {
            headers.insert(ORIGIN, origin.clone());
        }
        if let Some(referer) = &self.referer {
            headers.insert(REFERER, referer.clone());
        }
        if let Some(ip) = self.client_ip
            && let Ok(value) = HeaderValue::try_from(ip.to_string())
        {
            headers.insert("x-forwarded-for", value);
        }
        headers
    }
}

/// Primary sink: replays the inbound body to the vendor intake.
///
/// Any HTTP response counts as a successful delivery, whatever its status;
/// the caller sees the intake's answer verbatim.
pub struct PassthroughSink {
    client: reqwest::Client,
}

impl PassthroughSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sink for PassthroughSink {
    async fn send(&self, delivery: &Delivery) -> Result<SinkResponse, SinkError> {
        let response = self
            .client
            .post(delivery.target.clone())
            .headers(delivery.headers.to_header_map())
            .body(delivery.body.clone())
            .send()
            .await?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|source| SinkError::Body { status, source })?;

        Ok(SinkResponse {
            status,
            content_type,
            body,
        })
    }

    fn name(&self) -> &'static str {
        "primary"
    }
}
