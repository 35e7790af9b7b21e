mod memory;
mod sqlite;

use crate::cache_key::CacheKey;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use derive_more::Debug as DeriveDebug;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// A fully buffered response, as stored in and served from the edge cache.
#[derive(DeriveDebug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    #[debug(ignore)]
    pub body: Bytes,
}

impl CachedResponse {
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Shared key-value store of responses. Entries are only ever overwritten; eviction is
/// left to the backend.
#[derive(Clone)]
pub enum EdgeCache {
    Memory(MemoryCache),
    Sqlite(SqliteCache),
}

impl EdgeCache {
    /// SQLite when a database file is configured, memory otherwise.
    pub async fn open(cache_db: Option<&str>, capacity: u64) -> anyhow::Result<Self> {
        match cache_db {
            Some(database_file) => {
                tracing::info!("Using edge cache database {database_file}");
                Ok(EdgeCache::Sqlite(
                    SqliteCache::open(database_file, capacity).await?,
                ))
            }
            None => {
                tracing::info!("Using in-memory edge cache of {capacity} entries");
                Ok(EdgeCache::Memory(MemoryCache::new(capacity)))
            }
        }
    }

    pub async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<CachedResponse>> {
        match self {
            EdgeCache::Memory(cache) => Ok(cache.get(key).await),
            EdgeCache::Sqlite(cache) => cache.get(key).await,
        }
    }

    pub async fn put(&self, key: CacheKey, response: CachedResponse) -> anyhow::Result<()> {
        match self {
            EdgeCache::Memory(cache) => {
                cache.put(key, response).await;
                Ok(())
            }
            EdgeCache::Sqlite(cache) => cache.put(&key, &response).await,
        }
    }

    /// Looks up `key`, logging and ignoring backend failures so that a broken cache
    /// degrades to a miss.
    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        match self.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("Edge cache lookup for {key} failed: {e:?}");
                None
            }
        }
    }
}
