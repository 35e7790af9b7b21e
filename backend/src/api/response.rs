use crate::edge_cache::CachedResponse;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Tells clients whether a proxied response came out of the edge cache.
pub static X_EDGE_CACHE: HeaderName = HeaderName::from_static("x-edge-cache");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    fn header_value(self) -> HeaderValue {
        match self {
            CacheStatus::Hit => HeaderValue::from_static("HIT"),
            CacheStatus::Miss => HeaderValue::from_static("MISS"),
        }
    }
}

pub fn set_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
}

pub fn set_immutable(headers: &mut HeaderMap) {
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE));
}

pub fn with_cors(mut response: Response) -> Response {
    set_cors(response.headers_mut());
    response
}

/// Rewrites only the caching and CORS headers of a successful response; the body and
/// every other header are left as they are.
pub fn finalize(mut cached: CachedResponse, cache_status: CacheStatus) -> Response {
    set_immutable(&mut cached.headers);
    set_cors(&mut cached.headers);
    cached
        .headers
        .insert(X_EDGE_CACHE.clone(), cache_status.header_value());
    cached.into_response()
}

pub fn preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

pub fn method_not_allowed() -> Response {
    let mut response = with_cors(StatusCode::METHOD_NOT_ALLOWED.into_response());
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

pub fn bad_request(message: &'static str) -> Response {
    with_cors((StatusCode::BAD_REQUEST, message).into_response())
}

/// The path shape itself is invalid, so the answer never changes and may be cached.
pub fn not_found() -> Response {
    let mut response = with_cors((StatusCode::NOT_FOUND, "Not found").into_response());
    set_immutable(response.headers_mut());
    response
}

/// Upstream failures must never be cached, so the next request gets a fresh attempt.
pub fn upstream_failure(status: StatusCode, message: &'static str) -> Response {
    let mut response = with_cors((status, message).into_response());
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}
