/// Monitoring endpoint; deliberately bypasses CORS, the cache and every upstream.
pub async fn health() -> &'static str {
    "OK"
}
