use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::{LimitRequest, LimitResponse};
use crate::rate_limit::{IdentityKind, LimitDecision, LimitPolicy, RateLimiter};
use crate::state::AppState;

// Turn a rejection into the 429 the web tier forwards to the client
pub(crate) fn reject(limiter: &RateLimiter, decision: &LimitDecision, message: &str) -> ApiError {
    ApiError::RateLimited {
        message: message.to_string(),
        retry_after: decision.retry_after_secs(limiter.clock().now()),
    }
}

pub async fn limit_handler(
    State(state): State<Arc<AppState>>,
    Path(policy): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<LimitRequest>,
) -> Result<Json<LimitResponse>, ApiError> {
    REQUEST_TOTAL.inc();

    let policy: LimitPolicy = policy.parse()?;
    let identity = match (payload.identity, policy.identity_kind()) {
        (Some(id), _) if !id.trim().is_empty() => id,
        (_, IdentityKind::Ip) => super::client_ip(&headers),
        (_, IdentityKind::Email) => {
            return Err(ApiError::BadRequest(format!(
                "policy '{}' needs an email identity",
                policy
            )));
        }
    };

    let decision = state.limiter.check(policy, &identity).await;
    if !decision.allowed {
        return Err(reject(
            &state.limiter,
            &decision,
            "Too many requests. Please try again later.",
        ));
    }

    Ok(Json(LimitResponse {
        policy: policy.to_string(),
        allowed: decision.allowed,
        limit: decision.limit,
        remaining: decision.remaining,
        reset_at: decision.reset_at,
    }))
}
