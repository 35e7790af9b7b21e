use super::CachedResponse;
use crate::cache_key::CacheKey;
use anyhow::Context;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed store, bounded to `max_entries` rows. The least recently accessed
/// rows are evicted after each write.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    max_entries: i64,
}

impl SqliteCache {
    pub async fn open(database_file: &str, max_entries: u64) -> anyhow::Result<Self> {
        let in_memory = database_file == ":memory:";

        // Every connection to ":memory:" gets its own database, so keep exactly one alive.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_file)
                    .create_if_missing(true),
            )
            .await
            .context("Failed to connect to the cache database")?;

        MIGRATOR
            .run(&pool)
            .await
            .context("Failed to run cache database migrations")?;

        Ok(Self {
            pool,
            max_entries: i64::try_from(max_entries).unwrap_or(i64::MAX),
        })
    }

    pub async fn get(&self, key: &CacheKey) -> anyhow::Result<Option<CachedResponse>> {
        let row: Option<(i64, String, Vec<u8>)> = sqlx::query_as(
            "UPDATE edge_cache SET last_accessed = strftime('%Y-%m-%d %H:%M:%f', 'now')
             WHERE cache_key = ?
             RETURNING status, headers, body",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch cached response")?;

        let Some((status, headers, body)) = row else {
            return Ok(None);
        };

        let status = u16::try_from(status)
            .ok()
            .and_then(|status| StatusCode::from_u16(status).ok())
            .with_context(|| format!("Invalid cached status {status}"))?;

        Ok(Some(CachedResponse {
            status,
            headers: decode_headers(&headers)?,
            body: Bytes::from(body),
        }))
    }

    pub async fn put(&self, key: &CacheKey, response: &CachedResponse) -> anyhow::Result<()> {
        let headers = encode_headers(&response.headers)?;

        sqlx::query(
            "INSERT OR REPLACE INTO edge_cache (cache_key, status, headers, body, last_accessed)
             VALUES (?, ?, ?, ?, strftime('%Y-%m-%d %H:%M:%f', 'now'))",
        )
        .bind(key.as_str())
        .bind(i64::from(response.status.as_u16()))
        .bind(headers)
        .bind(response.body.as_ref())
        .execute(&self.pool)
        .await
        .context("Failed to store cached response")?;

        let evicted = sqlx::query(
            "DELETE FROM edge_cache WHERE cache_key NOT IN (
                SELECT cache_key FROM edge_cache
                ORDER BY last_accessed DESC, rowid DESC
                LIMIT ?
             )",
        )
        .bind(self.max_entries)
        .execute(&self.pool)
        .await
        .context("Failed to evict cached responses")?
        .rows_affected();

        if evicted > 0 {
            tracing::debug!("Evicted {evicted} cached responses");
        }

        Ok(())
    }
}

fn encode_headers(headers: &HeaderMap) -> anyhow::Result<String> {
    let pairs: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
        .collect();

    serde_json::to_string(&pairs).context("Failed to encode cached headers")
}

fn decode_headers(encoded: &str) -> anyhow::Result<HeaderMap> {
    let pairs: Vec<(String, String)> =
        serde_json::from_str(encoded).context("Failed to decode cached headers")?;

    pairs
        .into_iter()
        .map(|(name, value)| -> anyhow::Result<(HeaderName, HeaderValue)> {
            Ok((
                HeaderName::try_from(name).context("Invalid cached header name")?,
                HeaderValue::try_from(value).context("Invalid cached header value")?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use std::time::Duration;

    fn key(s: &str) -> CacheKey {
        CacheKey::ipfs(&s.parse().unwrap())
    }

    fn response(body: &'static [u8]) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.append(header::VARY, HeaderValue::from_static("accept"));
        headers.append(header::VARY, HeaderValue::from_static("origin"));
        CachedResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn stores_status_headers_and_body() {
        let cache = SqliteCache::open(":memory:", 16).await.unwrap();
        assert!(cache.get(&key("/ipfs/a")).await.unwrap().is_none());

        cache.put(&key("/ipfs/a"), &response(b"png")).await.unwrap();

        let hit = cache.get(&key("/ipfs/a")).await.unwrap().unwrap();
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(hit.body, Bytes::from_static(b"png"));
        assert_eq!(hit.headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(hit.headers.get_all(header::VARY).iter().count(), 2);
    }

    #[tokio::test]
    async fn put_overwrites_existing_entry() {
        let cache = SqliteCache::open(":memory:", 16).await.unwrap();
        cache.put(&key("/ipfs/a"), &response(b"old")).await.unwrap();
        cache.put(&key("/ipfs/a"), &response(b"new")).await.unwrap();

        let hit = cache.get(&key("/ipfs/a")).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn evicts_least_recently_accessed() {
        let cache = SqliteCache::open(":memory:", 2).await.unwrap();
        cache.put(&key("/ipfs/a"), &response(b"a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.put(&key("/ipfs/b"), &response(b"b")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get(&key("/ipfs/a")).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.put(&key("/ipfs/c"), &response(b"c")).await.unwrap();

        assert!(cache.get(&key("/ipfs/a")).await.unwrap().is_some());
        assert!(cache.get(&key("/ipfs/b")).await.unwrap().is_none());
        assert!(cache.get(&key("/ipfs/c")).await.unwrap().is_some());
    }
}
