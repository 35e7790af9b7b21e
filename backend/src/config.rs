use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

const DEFAULT_GATEWAYS: [&str; 4] = [
    "https://ipfs.io/ipfs/",
    "https://dweb.link/ipfs/",
    "https://w3s.link/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
];

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Edge cache in front of IPFS gateways and an object-storage origin")]
pub struct Config {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8787")]
    pub listen: SocketAddr,

    /// Base URL of the object-storage bucket serving `/daily/*`.
    #[arg(long, env = "ORIGIN_URL", value_parser = parse_origin)]
    pub origin_url: Url,

    /// Gateway base URLs; the CID and path are appended verbatim.
    #[arg(
        long = "gateway",
        env = "IPFS_GATEWAYS",
        value_delimiter = ',',
        default_values = DEFAULT_GATEWAYS,
        value_parser = parse_gateway,
    )]
    pub gateways: Vec<Url>,

    #[arg(long, env = "ORIGIN_TIMEOUT_MS", default_value_t = 15_000)]
    pub origin_timeout_ms: u64,

    /// Used when a request carries no usable `timeout` parameter.
    #[arg(long, env = "GATEWAY_TIMEOUT_MS", default_value_t = 10_000)]
    pub gateway_timeout_ms: u64,

    #[arg(long, env = "MAX_GATEWAY_TIMEOUT_MS", default_value_t = 30_000)]
    pub max_gateway_timeout_ms: u64,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub max_body_bytes: u64,

    /// SQLite file backing the edge cache. The cache lives in memory when unset.
    #[arg(long, env = "CACHE_DB")]
    pub cache_db: Option<String>,

    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 10_000)]
    pub cache_capacity: u64,
}

impl Config {
    pub fn origin_timeout(&self) -> Duration {
        Duration::from_millis(self.origin_timeout_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    pub fn max_gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.max_gateway_timeout_ms)
    }
}

fn parse_origin(value: &str) -> Result<Url, String> {
    let url = Url::parse(value.trim()).map_err(|e| format!("invalid origin url {value:?}: {e}"))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(format!("origin {value:?} must be an http(s) base url"));
    }

    Ok(url)
}

fn parse_gateway(value: &str) -> Result<Url, String> {
    let value = value.trim();
    let url = if value.ends_with('/') {
        Url::parse(value)
    } else {
        Url::parse(&format!("{value}/"))
    }
    .map_err(|e| format!("invalid gateway url {value:?}: {e}"))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(format!("gateway {value:?} must be an http(s) base url"));
    }

    Ok(url)
}
