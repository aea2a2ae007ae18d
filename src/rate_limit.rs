use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::metrics::{LIMIT_ALLOWED, LIMIT_REJECTED, STORE_FALLBACKS};
use crate::store::{StoreError, UpstashStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitError {
    #[error("invalid limit: max={max}, window={window_secs}s (positive, window up to a year)")]
    InvalidLimit { max: u32, window_secs: u64 },
    #[error("unknown rate limit policy: {0}")]
    UnknownPolicy(String),
}

// Rate limit entry - tracks requests per namespaced key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub key: String,
    pub count: u32,
    pub window_reset_at: DateTime<Utc>,
}

// Longest window a limit may use: one year
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// How many requests a key may make per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub max: u32,
    pub window: Duration,
}

impl Limit {
    pub fn new(max: u32, window_secs: u64) -> Result<Self, LimitError> {
        if max == 0 || window_secs == 0 || window_secs > MAX_WINDOW_SECS {
            return Err(LimitError::InvalidLimit { max, window_secs });
        }
        Ok(Self {
            max,
            window: Duration::seconds(window_secs as i64),
        })
    }

    pub fn window_secs(&self) -> u64 {
        self.window.num_seconds() as u64
    }
}

/// Outcome of a single `limit` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub count: u32,
    pub remaining: u32,
    #[serde(rename = "resetAt")]
    pub reset_at: DateTime<Utc>,
}

impl LimitDecision {
    fn from_entry(entry: &RateLimitEntry, limit: &Limit) -> Self {
        Self {
            allowed: entry.count <= limit.max,
            limit: limit.max,
            count: entry.count,
            remaining: limit.max.saturating_sub(entry.count),
            reset_at: entry.window_reset_at,
        }
    }

    /// Whole seconds until the window resets, never below 1 for a rejection.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        let secs = millis.div_ceil(1000);
        if self.allowed { secs } else { secs.max(1) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Ip,
    Email,
}

/// Named limiter policies. Each one is its own key namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitPolicy {
    Login,
    Signup,
    SignupEmail,
    PasswordReset,
    Upload,
    Search,
}

impl LimitPolicy {
    pub const ALL: [LimitPolicy; 6] = [
        LimitPolicy::Login,
        LimitPolicy::Signup,
        LimitPolicy::SignupEmail,
        LimitPolicy::PasswordReset,
        LimitPolicy::Upload,
        LimitPolicy::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitPolicy::Login => "login",
            LimitPolicy::Signup => "signup",
            LimitPolicy::SignupEmail => "signup-email",
            LimitPolicy::PasswordReset => "password-reset",
            LimitPolicy::Upload => "upload",
            LimitPolicy::Search => "search",
        }
    }

    pub fn limit(&self) -> Limit {
        let (max, window) = match self {
            LimitPolicy::Login => (5, 60),
            LimitPolicy::Signup => (3, 3600),
            LimitPolicy::SignupEmail => (2, 3600),
            LimitPolicy::PasswordReset => (3, 3600),
            LimitPolicy::Upload => (10, 60),
            LimitPolicy::Search => (60, 60),
        };
        Limit {
            max,
            window: Duration::seconds(window),
        }
    }

    pub fn identity_kind(&self) -> IdentityKind {
        match self {
            LimitPolicy::SignupEmail | LimitPolicy::PasswordReset => IdentityKind::Email,
            _ => IdentityKind::Ip,
        }
    }

    // "{policy}:{identity}", emails are normalised and hashed first
    pub fn store_key(&self, identity: &str) -> String {
        match self.identity_kind() {
            IdentityKind::Ip => format!("{}:{}", self.as_str(), identity.trim()),
            IdentityKind::Email => {
                let mut hasher = Sha256::new();
                hasher.update(identity.trim().to_lowercase());
                format!("{}:{:x}", self.as_str(), hasher.finalize())
            }
        }
    }
}

impl fmt::Display for LimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitPolicy {
    type Err = LimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LimitPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| LimitError::UnknownPolicy(s.to_string()))
    }
}

/// Atomic per-key counter with an expiring window.
pub trait CounterStore: Send + Sync {
    /// Count one request against `key`, opening a fresh window if the old one
    /// has expired, and return the entry after the increment.
    fn hit(
        &self,
        key: &str,
        limit: &Limit,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<RateLimitEntry, StoreError>> + Send;
}

/// In-process counter map.
///
/// Correct for any number of threads inside one process, but every process
/// (and every instance behind a load balancer) keeps its own counts. Used as
/// the fallback when the remote store is missing or failing.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str, limit: &Limit, now: DateTime<Utc>) -> RateLimitEntry {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                key: key.to_string(),
                count: 0,
                window_reset_at: now + limit.window,
            });

        // window expired..? start a new one
        if now >= entry.window_reset_at {
            entry.count = 0;
            entry.window_reset_at = now + limit.window;
        }

        // saturate at max + 1, a rejected key does not keep climbing
        entry.count = entry.count.saturating_add(1).min(limit.max.saturating_add(1));
        entry.clone()
    }

    // Drop entries whose window is over, returns how many went
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.window_reset_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CounterStore for LocalStore {
    async fn hit(
        &self,
        key: &str,
        limit: &Limit,
        now: DateTime<Utc>,
    ) -> Result<RateLimitEntry, StoreError> {
        Ok(self.record(key, limit, now))
    }
}

/// Fixed-count limiter over a remote primary store with a local fallback.
pub struct RateLimiter<P = UpstashStore> {
    primary: Option<P>,
    fallback: LocalStore,
    clock: Arc<dyn Clock>,
}

impl<P: CounterStore> RateLimiter<P> {
    pub fn new(primary: Option<P>, clock: Arc<dyn Clock>) -> Self {
        Self {
            primary,
            fallback: LocalStore::new(),
            clock,
        }
    }

    // No remote store, fallback only
    pub fn local(clock: Arc<dyn Clock>) -> Self {
        Self::new(None, clock)
    }

    pub fn backend(&self) -> &'static str {
        if self.primary.is_some() { "upstash" } else { "local" }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn fallback(&self) -> &LocalStore {
        &self.fallback
    }

    /// Count a request for `key` against `max` per `window_secs`.
    ///
    /// Keys live under a `custom:` namespace, so they never share a counter
    /// with a named policy.
    pub async fn limit(
        &self,
        key: &str,
        max: u32,
        window_secs: u64,
    ) -> Result<LimitDecision, LimitError> {
        let limit = Limit::new(max, window_secs)?;
        Ok(self.apply(&format!("custom:{}", key), &limit).await)
    }

    /// Count a request from `identity` under a named policy.
    pub async fn check(&self, policy: LimitPolicy, identity: &str) -> LimitDecision {
        let key = policy.store_key(identity);
        let decision = self.apply(&key, &policy.limit()).await;

        if decision.allowed {
            LIMIT_ALLOWED.with_label_values(&[policy.as_str()]).inc();
        } else {
            LIMIT_REJECTED.with_label_values(&[policy.as_str()]).inc();
            debug!(policy = %policy, count = decision.count, "request rate limited");
        }
        decision
    }

    async fn apply(&self, key: &str, limit: &Limit) -> LimitDecision {
        let now = self.clock.now();

        if let Some(primary) = &self.primary {
            match primary.hit(key, limit, now).await {
                Ok(entry) => return LimitDecision::from_entry(&entry, limit),
                Err(e) => {
                    STORE_FALLBACKS.inc();
                    warn!(error = %e, key = %key, "remote limiter failed, using in-process fallback");
                }
            }
        }

        let entry = self.fallback.record(key, limit, now);
        LimitDecision::from_entry(&entry, limit)
    }
}
