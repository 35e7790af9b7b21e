use axum::http::Uri;
use std::fmt;
use std::time::Duration;
use url::form_urlencoded;

/// Query parameter carrying the client's per-gateway fetch budget, in milliseconds.
pub const TIMEOUT_PARAM: &str = "timeout";

/// Key under which a response is stored in the edge cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Both the display filename (path) and the `src` object key (query) identify a
    /// distinct variant, so the request URI is used as is.
    pub fn daily(uri: &Uri) -> Self {
        Self(
            uri.path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| uri.path())
                .to_string(),
        )
    }

    /// The request URI without its `timeout` parameter.
    pub fn ipfs(uri: &Uri) -> Self {
        match uri.query().and_then(|query| without_param(query, TIMEOUT_PARAM)) {
            Some(query) => Self(format!("{}?{query}", uri.path())),
            None => Self(uri.path().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drops every `name` pair from a raw query string, keeping the remaining pairs
/// byte-for-byte. Returns `None` when nothing is left.
pub fn without_param(query: &str, name: &str) -> Option<String> {
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            form_urlencoded::parse(pair.as_bytes())
                .next()
                .is_none_or(|(key, _)| key != name)
        })
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

/// Effective per-gateway timeout for a raw `timeout` value.
///
/// Any finite number counts, fractions included. Absent, non-numeric, zero and
/// negative values fall back to `default`; anything above `max` is clamped to `max`.
/// Fractional milliseconds are truncated.
pub fn gateway_timeout(raw: Option<&str>, default: Duration, max: Duration) -> Duration {
    match raw.map(str::trim).and_then(|raw| raw.parse::<f64>().ok()) {
        Some(ms) if ms.is_finite() && ms > 0.0 => {
            if ms >= max.as_millis() as f64 {
                max
            } else {
                Duration::from_millis(ms as u64)
            }
        }
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_millis(10_000);
    const MAX: Duration = Duration::from_millis(30_000);

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn ipfs_key_ignores_timeout() {
        let short = CacheKey::ipfs(&uri("/ipfs/bafyabc/1.png?timeout=3000"));
        let long = CacheKey::ipfs(&uri("/ipfs/bafyabc/1.png?timeout=30000"));
        let none = CacheKey::ipfs(&uri("/ipfs/bafyabc/1.png"));
        assert_eq!(short, long);
        assert_eq!(short, none);
        assert_eq!(none.as_str(), "/ipfs/bafyabc/1.png");
    }

    #[test]
    fn ipfs_key_keeps_identity_params() {
        let a = CacheKey::ipfs(&uri("/ipfs/bafyabc?filename=a.png&timeout=5"));
        let b = CacheKey::ipfs(&uri("/ipfs/bafyabc?timeout=9&filename=b.png"));
        assert_eq!(a.as_str(), "/ipfs/bafyabc?filename=a.png");
        assert_eq!(b.as_str(), "/ipfs/bafyabc?filename=b.png");
        assert_ne!(a, b);
    }

    #[test]
    fn ipfs_key_distinguishes_content() {
        assert_ne!(
            CacheKey::ipfs(&uri("/ipfs/bafyabc/1.png")),
            CacheKey::ipfs(&uri("/ipfs/bafyabc/2.png"))
        );
    }

    #[test]
    fn daily_key_tracks_filename_and_src() {
        let base = CacheKey::daily(&uri("/daily/artwork-1.gif?src=raw_0007.gif"));
        let renamed = CacheKey::daily(&uri("/daily/artwork-2.gif?src=raw_0007.gif"));
        let other_src = CacheKey::daily(&uri("/daily/artwork-1.gif?src=raw_0008.gif"));
        assert_eq!(base.as_str(), "/daily/artwork-1.gif?src=raw_0007.gif");
        assert_ne!(base, renamed);
        assert_ne!(base, other_src);
    }

    #[test]
    fn without_param_preserves_encoding() {
        assert_eq!(
            without_param("name=a%20b&timeout=1&x=", "timeout").as_deref(),
            Some("name=a%20b&x=")
        );
        assert_eq!(without_param("timeout=1&&timeout=2", "timeout"), None);
        assert_eq!(without_param("time%6Fut=1", "timeout"), None);
    }

    #[test]
    fn timeout_defaults_and_clamps() {
        assert_eq!(gateway_timeout(None, DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("abc"), DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("0"), DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("-50"), DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("inf"), DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("NaN"), DEFAULT, MAX), DEFAULT);
        assert_eq!(gateway_timeout(Some("99999"), DEFAULT, MAX), MAX);
        assert_eq!(gateway_timeout(Some("99999999999999999999"), DEFAULT, MAX), MAX);
        assert_eq!(gateway_timeout(Some("1e5"), DEFAULT, MAX), MAX);
        assert_eq!(
            gateway_timeout(Some("2500.5"), DEFAULT, MAX),
            Duration::from_millis(2500)
        );
        assert_eq!(
            gateway_timeout(Some("1500"), DEFAULT, MAX),
            Duration::from_millis(1500)
        );
    }
}
