//! Rate limiting, visibility gating and feed composition for the fan platform.
//!
//! The three pieces are independent: [`rate_limit`] throttles requests per
//! client identity, [`visibility`] decides whether a subscriber tier may see a
//! piece of content, and [`feed`] sorts and pages already fetched posts. The
//! [`app`] router exposes them over HTTP to the web tier.

pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod visibility;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{
    feed_handler, health_handler, limit_handler, metrics_handler, visibility_handler,
};
use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/limits/{policy}", post(limit_handler))
        .route("/api/visibility", post(visibility_handler))
        .route("/api/feed", post(feed_handler))
        .with_state(state)
}
