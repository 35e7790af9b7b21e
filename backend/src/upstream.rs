use crate::edge_cache::CachedResponse;
use crate::first_success::FirstSuccess;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use futures::StreamExt;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream responded with {0}")]
    Status(StatusCode),
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream body exceeds {0} bytes")]
    TooLarge(u64),
}

/// Buffers successful upstream responses so they can be both returned and cached.
#[derive(Clone)]
pub struct Upstream {
    client: reqwest::Client,
    max_body_bytes: u64,
}

impl Upstream {
    pub fn new(client: reqwest::Client, max_body_bytes: u64) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    /// GETs `url`. Anything but a 2xx response fully read within `timeout` is an error.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<CachedResponse, FetchError> {
        let resp = self.client.get(url).timeout(timeout).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        if resp
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes)
        {
            return Err(FetchError::TooLarge(self.max_body_bytes));
        }

        let headers = forwardable_headers(resp.headers());

        let mut data = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
            if data.len() as u64 > self.max_body_bytes {
                return Err(FetchError::TooLarge(self.max_body_bytes));
            }
        }

        Ok(CachedResponse {
            status,
            headers,
            body: Bytes::from(data),
        })
    }

    /// Fetches every candidate concurrently and returns the first success along with
    /// the URL that produced it. The remaining requests are abandoned.
    #[instrument(skip(self, candidates))]
    pub async fn race(
        &self,
        candidates: Vec<String>,
        timeout: Duration,
    ) -> Result<(String, CachedResponse), Vec<(String, FetchError)>> {
        FirstSuccess::new(candidates.into_iter().map(|url| async move {
            match self.fetch(&url, timeout).await {
                Ok(resp) => Ok((url, resp)),
                Err(e) => {
                    tracing::debug!("Gateway {url} failed: {e}");
                    Err((url, e))
                }
            }
        }))
        .await
    }
}

fn forwardable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::CONTENT_LENGTH,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
        header::HeaderName::from_static("keep-alive"),
    ] {
        headers.remove(name);
    }

    let cors: Vec<_> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in cors {
        headers.remove(name);
    }

    headers
}
