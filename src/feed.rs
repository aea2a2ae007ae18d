use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

use crate::visibility::{SubscriptionTier, VisibilityTier, can_view};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("page numbers start at 1")]
    InvalidPage,
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

// A post as handed over by the data layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "missing_tier", deserialize_with = "lenient_tier")]
    pub visibility: VisibilityTier,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub viewer_has_liked: bool,
}

impl ContentItem {
    pub fn engagement(&self) -> u64 {
        2 * u64::from(self.like_count) + u64::from(self.comment_count)
    }
}

// Unparseable timestamps become None instead of failing the whole feed
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }))
}

fn missing_tier() -> VisibilityTier {
    VisibilityTier::Unknown(String::new())
}

// Absent, null or non-string tiers become Unknown, which the gate denies
fn lenient_tier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VisibilityTier, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => VisibilityTier::parse(&s),
        Some(other) => VisibilityTier::Unknown(other.to_string()),
        None => missing_tier(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
    #[default]
    Latest,
    Trending,
    MostCommented,
    // No follow graph yet, so this orders exactly like Latest
    Following,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPage {
    pub items: Vec<ContentItem>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

// Newest first, missing timestamps last
fn by_recency(a: &ContentItem, b: &ContentItem) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn sort_items(items: &mut [ContentItem], sort_by: SortBy) {
    match sort_by {
        SortBy::Latest | SortBy::Following => items.sort_by(by_recency),
        // undated rows go to the bottom regardless of engagement
        SortBy::Trending => items.sort_by(|a, b| {
            b.created_at
                .is_some()
                .cmp(&a.created_at.is_some())
                .then_with(|| b.engagement().cmp(&a.engagement()))
                .then_with(|| by_recency(a, b))
        }),
        SortBy::MostCommented => items.sort_by(|a, b| {
            b.comment_count
                .cmp(&a.comment_count)
                .then_with(|| by_recency(a, b))
        }),
    }
}

/// Annotate, sort and cut one page out of an already fetched set of items.
pub fn compose_feed(
    mut items: Vec<ContentItem>,
    liked_ids: &HashSet<String>,
    sort_by: SortBy,
    page: usize,
    page_size: usize,
) -> Result<FeedPage, FeedError> {
    if page == 0 {
        return Err(FeedError::InvalidPage);
    }
    if page_size == 0 {
        return Err(FeedError::InvalidPageSize);
    }

    for item in items.iter_mut() {
        item.viewer_has_liked = liked_ids.contains(&item.id);
    }
    sort_items(&mut items, sort_by);

    let total = items.len();
    let offset = (page - 1).saturating_mul(page_size);
    let has_next = total > offset.saturating_add(page_size);

    let items = items.into_iter().skip(offset).take(page_size).collect();

    Ok(FeedPage {
        items,
        page,
        page_size,
        total,
        has_next,
        has_previous: page > 1,
    })
}

/// Like `compose_feed`, but first drops everything the viewer's tier may not see.
pub fn visible_feed(
    items: Vec<ContentItem>,
    viewer: SubscriptionTier,
    liked_ids: &HashSet<String>,
    sort_by: SortBy,
    page: usize,
    page_size: usize,
) -> Result<FeedPage, FeedError> {
    let visible = items
        .into_iter()
        .filter(|item| can_view(&item.visibility, viewer))
        .collect();
    compose_feed(visible, liked_ids, sort_by, page, page_size)
}
