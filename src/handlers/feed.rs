use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::error::ApiError;
use crate::feed::{FeedPage, visible_feed};
use crate::metrics::{FEED_LATENCY, REQUEST_TOTAL};
use crate::models::FeedRequest;
use crate::rate_limit::LimitPolicy;
use crate::state::AppState;

use super::limits::reject;

pub async fn feed_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<FeedRequest>,
) -> Result<Json<FeedPage>, ApiError> {
    REQUEST_TOTAL.inc();

    let ip = super::client_ip(&headers);
    let decision = state.limiter.check(LimitPolicy::Search, &ip).await;
    if !decision.allowed {
        return Err(reject(&state.limiter, &decision, "Rate limit exceeded"));
    }

    if payload.items.len() > state.max_feed_items {
        return Err(ApiError::BadRequest(format!(
            "at most {} items per request, got {}",
            state.max_feed_items,
            payload.items.len()
        )));
    }

    let start_time = Instant::now();
    let submitted = payload.items.len();

    let page = visible_feed(
        payload.items,
        payload.viewer_tier,
        &payload.liked_ids,
        payload.sort_by,
        payload.page,
        payload.page_size,
    )?;

    FEED_LATENCY.observe(start_time.elapsed().as_secs_f64());
    debug!(
        submitted,
        visible = page.total,
        page = page.page,
        sort = ?payload.sort_by,
        "feed composed"
    );

    Ok(Json(page))
}
