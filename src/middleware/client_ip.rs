//! Client IP derivation for the intake's `X-Forwarded-For`.

use std::net::{IpAddr, SocketAddr};

use http::HeaderMap;

/// Derive the originating client IP.
///
/// Checked in order: `CF-Connecting-IP` (edge platform), `X-Real-IP`, the
/// leftmost `X-Forwarded-For` entry, then the TCP peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    for name in ["cf-connecting-ip", "x-real-ip"] {
        if let Some(value) = headers.get(name)
            && let Ok(text) = value.to_str()
            && let Ok(ip) = text.trim().parse::<IpAddr>()
        {
            return Some(ip);
        }
    }

    if let Some(value) = headers.get("x-forwarded-for")
        && let Ok(text) = value.to_str()
        && let Some(ip) = text
            .split(',')
            .next()
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    peer.map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.1:5555".parse().unwrap())
    }

    #[test]
    fn test_edge_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("198.51.100.4"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.5"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.6"));
        assert_eq!(client_ip(&headers, peer()), "198.51.100.4".parse().ok());
    }

    #[test]
    fn test_leftmost_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.2, 10.0.0.3"),
        );
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9".parse().ok());
    }

    #[test]
    fn test_garbage_headers_fall_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));
        assert_eq!(client_ip(&headers, peer()), "10.0.0.1".parse().ok());
        assert_eq!(client_ip(&headers, None), None);
    }
}
