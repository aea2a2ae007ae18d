use clap::Parser;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "fanfeed-gateway")]
#[command(about = "Rate limiting, visibility and feed composition sidecar")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Upstash Redis REST endpoint, e.g. "https://eu1-xyz.upstash.io"
    #[arg(long, env = "UPSTASH_REDIS_REST_URL")]
    pub store_url: Option<String>,

    // Token for the REST endpoint
    #[arg(long, env = "UPSTASH_REDIS_REST_TOKEN", hide_env_values = true)]
    pub store_token: Option<String>,

    // Per-call timeout for the remote store in milliseconds
    #[arg(long, default_value_t = 500)]
    pub store_timeout_ms: u64,

    // Upper bound on items accepted by /api/feed
    #[arg(long, default_value_t = 100)]
    pub max_feed_items: usize,

    // How often expired fallback entries are purged, in seconds
    #[arg(long, default_value_t = 60)]
    pub purge_interval: u64,

    // Log filter, e.g. "info" or "fanfeed_gateway=debug"
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}
