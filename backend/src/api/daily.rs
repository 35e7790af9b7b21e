use super::{ApiState, respond_and_store};
use crate::api::response::{self, CacheStatus};
use crate::cache_key::CacheKey;
use crate::upstream::FetchError;
use crate::util::http_error::{AnyhowHttpError, HttpResult};
use anyhow::Context;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

const ORIGIN_FETCH_FAILED: &str = "R2 fetch failed";

#[derive(Deserialize, Debug)]
pub struct Params {
    /// Object key at the origin.
    pub src: Option<String>,
}

/// Serves `src` from the object-storage origin under the display name taken from the
/// path, so "Save As" uses `filename` regardless of how the object is stored.
#[instrument(skip(state, params, uri))]
pub async fn get_daily(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
    params: Result<Query<Params>, QueryRejection>,
    uri: Uri,
) -> HttpResult<Response> {
    let src = match params {
        Ok(Query(Params { src: Some(src) })) if !src.is_empty() => src,
        _ => return Ok(response::bad_request("Missing src parameter")),
    };

    let key = CacheKey::daily(&uri);
    if let Some(hit) = state.cache.lookup(&key).await {
        tracing::debug!("Edge cache hit for {key}");
        return Ok(response::finalize(hit, CacheStatus::Hit));
    }

    let url = origin_object_url(&state.config.origin_url, &src)
        .context("Error building origin url")
        .into_internal_error_result()?;

    let mut fetched = match state
        .upstream
        .fetch(url.as_str(), state.config.origin_timeout())
        .await
    {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!("Fetching {url} failed: {e}");
            let status = match e {
                FetchError::Status(status) => status,
                FetchError::TooLarge(_) => StatusCode::BAD_GATEWAY,
                FetchError::Transport(_) => StatusCode::GATEWAY_TIMEOUT,
            };
            return Ok(response::upstream_failure(status, ORIGIN_FETCH_FAILED));
        }
    };

    fetched
        .headers
        .insert(header::CONTENT_DISPOSITION, content_disposition(&filename));

    Ok(respond_and_store(&state, key, fetched))
}

/// `{origin}/dailies/{src}`, with `src` percent-encoded as a single path segment.
fn origin_object_url(origin: &Url, src: &str) -> anyhow::Result<Url> {
    let mut url = origin.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Origin url {origin} cannot be a base"))?
        .pop_if_empty()
        .push("dailies")
        .push(src);
    Ok(url)
}

fn content_disposition(filename: &str) -> HeaderValue {
    let filename: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();

    HeaderValue::try_from(format!("inline; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_encodes_src_as_one_segment() {
        let origin = Url::parse("https://media.test/bucket/").unwrap();
        assert_eq!(
            origin_object_url(&origin, "raw 0007.gif").unwrap().as_str(),
            "https://media.test/bucket/dailies/raw%200007.gif"
        );
        assert_eq!(
            origin_object_url(&origin, "../secret").unwrap().as_str(),
            "https://media.test/bucket/dailies/..%2Fsecret"
        );

        let bare = Url::parse("https://media.test").unwrap();
        assert_eq!(
            origin_object_url(&bare, "raw_0007.gif").unwrap().as_str(),
            "https://media.test/dailies/raw_0007.gif"
        );
    }

    #[test]
    fn content_disposition_strips_quotes() {
        assert_eq!(
            content_disposition("artwork-1.gif"),
            "inline; filename=\"artwork-1.gif\""
        );
        assert_eq!(
            content_disposition("a\"b\r\n.gif"),
            "inline; filename=\"ab.gif\""
        );
    }
}
