//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Cart mutations are limited per client IP with `cart_rate_limiter`. Page
//! views are not limited; they are served mostly from the catalog cache.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Headers a fronting proxy may set with the visitor's address, in the
/// order they are trusted. `x-forwarded-for` contributes its first hop.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// First parseable client address found in the proxy headers.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .split(',')
            .next()?
            .trim()
            .parse()
            .ok()
    })
}

/// Keys the limiter on the visitor's IP.
///
/// Proxy headers win when present. Without them (the storefront served
/// directly) the TCP peer address from `ConnectInfo` is used, which requires
/// serving with `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(peer)| peer.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
///
/// Keyed by `ClientIpKeyExtractor`.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for cart mutations: ~120 requests per minute per IP.
///
/// Configuration: 1 request every half second (replenish), burst of 30.
/// Every cart mutation is forwarded to Chec, so this also bounds how hard a
/// single client can drive the upstream API.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// values (`per_millisecond(500)` and `burst_size(30)`), which are always
/// accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn cart_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_millisecond(500)
        .burst_size(30)
        .finish()
        .expect("rate limiter config with per_millisecond(500) and burst_size(30) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/cart/add");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
        ConnectInfo(addr.parse().unwrap())
    }

    #[test]
    fn test_prefers_cloudflare_header() {
        let req = request(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.1"),
        ]);
        let ip = ClientIpKeyExtractor.extract(&req).ok();
        assert_eq!(ip, "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_uses_first_forwarded_address() {
        let req = request(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1")]);
        let ip = ClientIpKeyExtractor.extract(&req).ok();
        assert_eq!(ip, "198.51.100.1".parse().ok());
    }

    #[test]
    fn test_garbage_header_falls_through_to_next() {
        let req = request(&[("x-forwarded-for", "unknown"), ("x-real-ip", "192.0.2.4")]);
        let ip = ClientIpKeyExtractor.extract(&req).ok();
        assert_eq!(ip, "192.0.2.4".parse().ok());
    }

    #[test]
    fn test_direct_connection_uses_peer_address() {
        let mut req = request(&[]);
        req.extensions_mut().insert(peer("127.0.0.1:51234"));
        let ip = ClientIpKeyExtractor.extract(&req).ok();
        assert_eq!(ip, "127.0.0.1".parse().ok());
    }

    #[test]
    fn test_proxy_header_beats_peer_address() {
        let mut req = request(&[("x-real-ip", "198.51.100.9")]);
        req.extensions_mut().insert(peer("10.0.0.2:443"));
        let ip = ClientIpKeyExtractor.extract(&req).ok();
        assert_eq!(ip, "198.51.100.9".parse().ok());
    }

    #[test]
    fn test_no_headers_and_no_peer_fails_extraction() {
        let req = request(&[]);
        assert!(ClientIpKeyExtractor.extract(&req).is_err());
    }
}
