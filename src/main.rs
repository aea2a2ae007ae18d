use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use fanfeed_gateway::app;
use fanfeed_gateway::clock::{Clock, SystemClock};
use fanfeed_gateway::config::Args;
use fanfeed_gateway::rate_limit::{LimitPolicy, RateLimiter};
use fanfeed_gateway::state::AppState;
use fanfeed_gateway::store::UpstashStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let primary = UpstashStore::from_parts(
        args.store_url.as_deref(),
        args.store_token.as_deref(),
        Duration::from_millis(args.store_timeout_ms),
    )
    .context("failed to build the remote limiter store")?;

    match &primary {
        Some(store) => info!(url = %store.url(), "rate limits backed by Upstash"),
        None => warn!(
            "UPSTASH_REDIS_REST_URL/TOKEN not set, rate limits are per-process only"
        ),
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState {
        limiter: RateLimiter::new(primary, clock),
        max_feed_items: args.max_feed_items,
    });

    // background purge of expired fallback entries
    let purge_state = Arc::clone(&state);
    let purge_every = Duration::from_secs(args.purge_interval.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            let now = purge_state.limiter.clock().now();
            let purged = purge_state.limiter.fallback().purge_expired(now);
            if purged > 0 {
                debug!(purged, "expired limiter entries purged");
            }
        }
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(port = args.port, "gateway listening");
    for policy in LimitPolicy::ALL {
        let limit = policy.limit();
        info!(
            policy = %policy,
            max = limit.max,
            window_secs = limit.window_secs(),
            "rate limit policy"
        );
    }

    axum::serve(listener, app(state))
        .await
        .context("server error")?;
    Ok(())
}
