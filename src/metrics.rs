use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, register_counter, register_counter_vec, register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("fanfeed_requests_total", "Total number of requests").unwrap();
    pub static ref LIMIT_ALLOWED: CounterVec = register_counter_vec!(
        "fanfeed_limit_allowed_total",
        "Requests let through by a rate limit policy",
        &["policy"]
    )
    .unwrap();
    pub static ref LIMIT_REJECTED: CounterVec = register_counter_vec!(
        "fanfeed_limit_rejected_total",
        "Requests rejected by a rate limit policy",
        &["policy"]
    )
    .unwrap();
    pub static ref STORE_FALLBACKS: Counter = register_counter!(
        "fanfeed_store_fallbacks_total",
        "Remote limiter failures served by the in-process fallback"
    )
    .unwrap();
    pub static ref FEED_LATENCY: Histogram = register_histogram!(
        "fanfeed_feed_compose_seconds",
        "Feed composition latency in seconds"
    )
    .unwrap();
}
