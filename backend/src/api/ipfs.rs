use super::{ApiState, respond_and_store};
use crate::api::response::{self, CacheStatus};
use crate::cache_key::{CacheKey, TIMEOUT_PARAM, gateway_timeout, without_param};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

#[derive(Deserialize, Debug)]
pub struct Params {
    /// Per-gateway fetch budget in milliseconds, kept raw so that malformed values
    /// fall back to the default instead of rejecting the request.
    pub timeout: Option<String>,
}

#[instrument(skip(state, params))]
pub async fn get_ipfs(
    State(state): State<ApiState>,
    params: Result<Query<Params>, QueryRejection>,
    uri: Uri,
) -> Response {
    let Some(cid_and_path) = uri
        .path()
        .strip_prefix("/ipfs/")
        .filter(|rest| !rest.is_empty())
    else {
        return response::not_found();
    };

    let key = CacheKey::ipfs(&uri);
    if let Some(hit) = state.cache.lookup(&key).await {
        tracing::debug!("Edge cache hit for {key}");
        return response::finalize(hit, CacheStatus::Hit);
    }

    let requested = params.ok().and_then(|Query(params)| params.timeout);
    let timeout = gateway_timeout(
        requested.as_deref(),
        state.config.gateway_timeout(),
        state.config.max_gateway_timeout(),
    );

    // Everything but the timeout hint is part of the content's identity, so gateways see it too.
    let query = uri
        .query()
        .and_then(|query| without_param(query, TIMEOUT_PARAM));

    let candidates = state
        .config
        .gateways
        .iter()
        .map(|gateway| match &query {
            Some(query) => format!("{gateway}{cid_and_path}?{query}"),
            None => format!("{gateway}{cid_and_path}"),
        })
        .collect();

    match state.upstream.race(candidates, timeout).await {
        Ok((winner, fetched)) => {
            tracing::debug!("Serving {cid_and_path} from {winner}");
            respond_and_store(&state, key, fetched)
        }
        Err(failures) => {
            tracing::warn!(
                "All {} gateways failed for {cid_and_path} within {timeout:?}",
                failures.len()
            );
            response::upstream_failure(StatusCode::GATEWAY_TIMEOUT, "All gateways failed")
        }
    }
}
