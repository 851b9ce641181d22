//! Artifact delivery over HTTP.
//!
//! Ranges, MIME types and path confinement are left to tower-http's
//! `ServeFile`/`ServeDir`. Only multi-range requests are intercepted: they
//! get the whole file rather than a 416.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware, Router,
};
use std::path::Path;
use tower_http::services::ServeDir;

/// The client's `Range` header, unless it asks for several ranges.
pub fn single_range(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers
        .get(header::RANGE)
        .filter(|value| value.to_str().is_ok_and(|range| !range.contains(',')))
}

/// Strips multi-range headers so the file is served in full.
pub async fn ignore_multipart_range(mut request: Request) -> Request {
    if request.headers().contains_key(header::RANGE) && single_range(request.headers()).is_none() {
        request.headers_mut().remove(header::RANGE);
    }
    request
}

/// `GET /stream/{*path}`: any file under the downloads root. Nothing is
/// deleted afterwards.
pub fn artifact_router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(middleware::map_request(ignore_multipart_range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_range(range: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static(range));
        headers
    }

    #[test]
    fn test_single_range() {
        assert_eq!(
            single_range(&with_range("bytes=0-99")).map(|v| v.as_bytes()),
            Some(&b"bytes=0-99"[..])
        );
        assert!(single_range(&with_range("bytes=0-1,5-9")).is_none());
        assert!(single_range(&HeaderMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_multipart_range_is_dropped() {
        let request = Request::builder()
            .header(header::RANGE, "bytes=0-1,5-9")
            .body(axum::body::Body::empty())
            .unwrap();
        let request = ignore_multipart_range(request).await;
        assert!(request.headers().get(header::RANGE).is_none());

        let request = Request::builder()
            .header(header::RANGE, "bytes=-4")
            .body(axum::body::Body::empty())
            .unwrap();
        let request = ignore_multipart_range(request).await;
        assert_eq!(request.headers()[header::RANGE], "bytes=-4");
    }
}
