use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::feed::{ContentItem, SortBy};
use crate::visibility::{SubscriptionTier, VisibilityTier};

// Body of POST /api/limits/{policy}
#[derive(Deserialize, Debug, Default)]
pub struct LimitRequest {
    // IP or email; IP policies fall back to the caller's address
    #[serde(default)]
    pub identity: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct LimitResponse {
    pub policy: String,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    #[serde(rename = "resetAt")]
    pub reset_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub struct VisibilityRequest {
    pub content_tier: VisibilityTier,
    pub viewer_tier: SubscriptionTier,
}

#[derive(Serialize, Debug)]
pub struct VisibilityResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// Body of POST /api/feed - rows the caller already fetched
#[derive(Deserialize, Debug)]
pub struct FeedRequest {
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub liked_ids: HashSet<String>,
    #[serde(default)]
    pub viewer_tier: SubscriptionTier,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    crate::feed::DEFAULT_PAGE_SIZE
}
