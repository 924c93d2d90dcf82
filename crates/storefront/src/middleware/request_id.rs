//! Request ID middleware for request tracing and correlation.
//!
//! Every response carries an `x-request-id`. An ID supplied by an upstream
//! proxy is reused when it looks sane; otherwise a UUID v4 is generated. The
//! ID is recorded on the request span and tagged on the Sentry scope so a
//! failed Chec call can be matched to the page view that triggered it.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound request ID that is reused.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Reuse an inbound ID only if it is short printable ASCII without spaces.
fn inbound_request_id(value: Option<&HeaderValue>) -> Option<String> {
    let id = value?.to_str().ok()?;
    let valid = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic());
    valid.then(|| id.to_string())
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = inbound_request_id(request.headers().get(REQUEST_ID_HEADER))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_upstream_id() {
        let value = HeaderValue::from_static("cf-8a1b2c3d4e5f");
        assert_eq!(
            inbound_request_id(Some(&value)).as_deref(),
            Some("cf-8a1b2c3d4e5f")
        );
    }

    #[test]
    fn test_rejects_missing_or_odd_ids() {
        assert_eq!(inbound_request_id(None), None);
        assert_eq!(inbound_request_id(Some(&HeaderValue::from_static(""))), None);
        assert_eq!(
            inbound_request_id(Some(&HeaderValue::from_static("has space"))),
            None
        );

        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        let value = HeaderValue::from_str(&long).ok();
        assert_eq!(inbound_request_id(value.as_ref()), None);
    }
}
