//! Remote counter store over the Upstash Redis REST API.
//!
//! Each hit runs one transaction against `{url}/multi-exec`:
//!
//! ```text
//! SET   key 0 PX <window-ms> NX   -- open a window if none is running
//! INCR  key                       -- count this request (keeps the TTL)
//! PTTL  key                       -- time left in the window
//! ```
//!
//! Because the three commands run atomically inside Redis, every process that
//! shares the store sees the same count. The count itself is not capped here,
//! so a key hammered after rejection keeps climbing until its window ends.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration as StdDuration;
use thiserror::Error;

use crate::rate_limit::{CounterStore, Limit, RateLimitEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store returned status {0}")]
    Status(u16),
    #[error("store command failed: {0}")]
    Command(String),
    #[error("unexpected store response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

// One element of the multi-exec reply
#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpstashStore {
    client: Client,
    url: String,
    token: HeaderValue,
}

impl UpstashStore {
    pub fn new(url: &str, token: &str, timeout: StdDuration) -> Result<Self, StoreError> {
        let token = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| StoreError::Unavailable(format!("invalid store token: {}", e)))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            token,
        })
    }

    // Both settings are needed, anything less means "not configured"
    pub fn from_parts(
        url: Option<&str>,
        token: Option<&str>,
        timeout: StdDuration,
    ) -> Result<Option<Self>, StoreError> {
        match (url, token) {
            (Some(url), Some(token)) if !url.trim().is_empty() && !token.trim().is_empty() => {
                Self::new(url, token, timeout).map(Some)
            }
            _ => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn multi_exec(&self, commands: Value) -> Result<Vec<Value>, StoreError> {
        let res = self
            .client
            .post(format!("{}/multi-exec", self.url))
            .header(AUTHORIZATION, self.token.clone())
            .json(&commands)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(StoreError::Status(res.status().as_u16()));
        }

        let replies: Vec<CommandReply> = res
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        replies
            .into_iter()
            .map(|r| match r.error {
                Some(err) => Err(StoreError::Command(err)),
                None => Ok(r.result),
            })
            .collect()
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    // Upstash hands integers back as numbers, but accept numeric strings too
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

impl CounterStore for UpstashStore {
    async fn hit(
        &self,
        key: &str,
        limit: &Limit,
        now: DateTime<Utc>,
    ) -> Result<RateLimitEntry, StoreError> {
        let window_ms = limit.window.num_milliseconds();
        let commands = json!([
            ["SET", key, "0", "PX", window_ms.to_string(), "NX"],
            ["INCR", key],
            ["PTTL", key],
        ]);

        let results = self.multi_exec(commands).await?;
        if results.len() != 3 {
            return Err(StoreError::Malformed(format!(
                "expected 3 replies, got {}",
                results.len()
            )));
        }

        let count = as_i64(&results[1])
            .ok_or_else(|| StoreError::Malformed(format!("INCR reply: {}", results[1])))?;
        let pttl = as_i64(&results[2])
            .ok_or_else(|| StoreError::Malformed(format!("PTTL reply: {}", results[2])))?;

        // -1 means no expiry was set on the key; treat it as a full window
        let remaining_ms = if pttl < 0 { window_ms } else { pttl };

        Ok(RateLimitEntry {
            key: key.to_string(),
            count: u32::try_from(count.max(0)).unwrap_or(u32::MAX),
            window_reset_at: now + Duration::milliseconds(remaining_ms),
        })
    }
}
