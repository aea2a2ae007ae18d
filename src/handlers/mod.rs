mod feed;
mod health;
mod limits;
mod metrics;
mod visibility;

use axum::http::HeaderMap;

pub use feed::feed_handler;
pub use health::health_handler;
pub use limits::limit_handler;
pub use metrics::metrics_handler;
pub use visibility::visibility_handler;

// Client address as the edge proxy reports it
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}
