use crate::rate_limit::RateLimiter;

// app's shared state

pub struct AppState {
    pub limiter: RateLimiter,
    pub max_feed_items: usize, // largest item list /api/feed will compose
}
