use super::CachedResponse;
use crate::cache_key::CacheKey;
use moka::future::Cache;
use std::sync::Arc;

#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<CacheKey, Arc<CachedResponse>>,
}

impl MemoryCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::new(max_entries),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.entries.get(key).await.map(|entry| (*entry).clone())
    }

    pub async fn put(&self, key: CacheKey, response: CachedResponse) {
        self.entries.insert(key, Arc::new(response)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, StatusCode, header};

    fn key(s: &str) -> CacheKey {
        CacheKey::ipfs(&s.parse().unwrap())
    }

    #[tokio::test]
    async fn stores_and_overwrites() {
        let cache = MemoryCache::new(16);
        assert!(cache.get(&key("/ipfs/a")).await.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));
        cache
            .put(
                key("/ipfs/a"),
                CachedResponse {
                    status: StatusCode::OK,
                    headers,
                    body: Bytes::from_static(b"one"),
                },
            )
            .await;

        let hit = cache.get(&key("/ipfs/a?timeout=1")).await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"one"));
        assert_eq!(hit.headers[header::ETAG], "\"v1\"");

        cache
            .put(
                key("/ipfs/a"),
                CachedResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(b"two"),
                },
            )
            .await;
        let hit = cache.get(&key("/ipfs/a")).await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"two"));
    }
}
