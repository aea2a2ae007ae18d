use axum::Json;

use crate::metrics::REQUEST_TOTAL;
use crate::models::{VisibilityRequest, VisibilityResponse};
use crate::visibility::{Authorize, Decision, VisibilityPolicy};

pub async fn visibility_handler(Json(payload): Json<VisibilityRequest>) -> Json<VisibilityResponse> {
    REQUEST_TOTAL.inc();

    let response = match VisibilityPolicy.authorize(&payload.viewer_tier, &payload.content_tier) {
        Decision::Allow => VisibilityResponse {
            allowed: true,
            reason: None,
        },
        Decision::Deny(reason) => VisibilityResponse {
            allowed: false,
            reason: Some(reason),
        },
    };
    Json(response)
}
