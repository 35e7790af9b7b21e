use crate::cache_key::CacheKey;
use crate::config::Config;
use crate::edge_cache::{CachedResponse, EdgeCache};
use crate::upstream::Upstream;
use crate::util::tasks::DeferredTasks;
use anyhow::Context;
use axum::extract::Request;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use response::CacheStatus;
use std::sync::Arc;

mod daily;
mod health;
mod ipfs;
pub mod response;

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub cache: EdgeCache,
    pub upstream: Upstream,
    pub deferred: DeferredTasks,
}

impl ApiState {
    pub fn new(config: Config, cache: EdgeCache) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            upstream: Upstream::new(http_client, config.max_body_bytes),
            config: Arc::new(config),
            cache,
            deferred: DeferredTasks::new(),
        })
    }
}

pub fn build_api_router() -> axum::Router<ApiState> {
    use axum::Router;

    Router::new()
        .route(HEALTH_PATH, get(health::health))
        .route("/daily/{*filename}", get(daily::get_daily))
        .route("/ipfs/{*cid_and_path}", get(ipfs::get_ipfs))
        .fallback(not_found)
        .layer(middleware::from_fn(method_guard))
}

/// Answers preflights and rejects anything but GET/HEAD before routing, so neither
/// the cache nor any upstream is touched.
async fn method_guard(req: Request, next: Next) -> Response {
    match *req.method() {
        Method::GET | Method::HEAD => next.run(req).await,
        Method::OPTIONS => response::preflight(),
        _ => response::method_not_allowed(),
    }
}

async fn not_found() -> Response {
    response::not_found()
}

/// Returns a fresh upstream response and stores a copy in the edge cache once the
/// response is on its way.
fn respond_and_store(state: &ApiState, key: CacheKey, mut fetched: CachedResponse) -> Response {
    response::set_immutable(&mut fetched.headers);
    response::set_cors(&mut fetched.headers);

    let cache = state.cache.clone();
    let stored = fetched.clone();
    state.deferred.spawn(async move {
        let description = format!("Error storing {key} in the edge cache");
        cache.put(key, stored).await.context(description)
    });

    response::finalize(fetched, CacheStatus::Miss)
}
