// src/cache.rs

//! The authorization-code cache: a time-bounded map from issued codes to
//! their expected PKCE challenges.
//!
//! Backed by a `moka` cache so that per-key operations are linearizable
//! under concurrent request handlers. Expiry is enforced lazily on every
//! lookup (an expired-but-unswept entry is absent to callers), with a
//! background sweep reclaiming expired entries on a fixed interval.

use crate::error::OidcTesterError;
use moka::future::Cache;
use moka::Expiry;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// How long an issued authorization code remains redeemable.
pub const DEFAULT_CODE_TTL: Duration = Duration::from_secs(180);

const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

const SHORT_CODE_LEN: usize = 22;
const SHORT_CODE_ATTEMPTS: u32 = 8;
const WIDE_CODE_ATTEMPTS: u32 = 8;

#[derive(Clone)]
struct CodeEntry {
    challenge: String,
    ttl: Duration,
}

/// Each entry expires after its own TTL rather than a cache-wide one.
struct PerEntryTtl;

impl Expiry<String, CodeEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CodeEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// The code → challenge store owned by the mock identity provider.
///
/// Constructed once and passed by handle into every request handler; there
/// is no ambient global instance. Cloning shares the underlying cache.
#[derive(Clone)]
pub struct CodeCache {
    entries: Cache<String, CodeEntry>,
}

impl CodeCache {
    /// Creates the cache and spawns its background sweep task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let entries: Cache<String, CodeEntry> =
            Cache::builder().expire_after(PerEntryTtl).build();

        let sweeper = entries.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.tick().await; // the first tick fires immediately
            loop {
                tick.tick().await;
                sweeper.run_pending_tasks().await;
            }
        });

        Self { entries }
    }

    /// Stores `code → challenge` for `ttl`.
    pub async fn insert(
        &self,
        code: impl Into<String>,
        challenge: impl Into<String>,
        ttl: Duration,
    ) {
        self.entries
            .insert(
                code.into(),
                CodeEntry {
                    challenge: challenge.into(),
                    ttl,
                },
            )
            .await;
    }

    /// The challenge stored for `code`, or `None` when the code is unknown,
    /// already redeemed, or expired. The caller cannot distinguish the
    /// three cases.
    pub async fn get(&self, code: &str) -> Option<String> {
        self.entries.get(code).await.map(|e| e.challenge)
    }

    /// Deletes a code, typically on successful redemption.
    pub async fn remove(&self, code: &str) {
        self.entries.invalidate(code).await;
    }

    /// Generates a fresh code, unique among live entries, and stores it
    /// bound to `challenge`.
    ///
    /// The uniqueness check and the insertion are a single atomic step
    /// (the cache's entry API), so two concurrent calls can never claim
    /// the same code. Retries are bounded: after 8 collisions on the
    /// short alphanumeric form the entropy is widened to a UUID, and
    /// exhausting that bound too is an explicit error.
    pub async fn issue_code(
        &self,
        challenge: &str,
        ttl: Duration,
    ) -> Result<String, OidcTesterError> {
        let total_attempts = SHORT_CODE_ATTEMPTS + WIDE_CODE_ATTEMPTS;
        for attempt in 0..total_attempts {
            let code = if attempt < SHORT_CODE_ATTEMPTS {
                short_code()
            } else {
                wide_code()
            };
            let entry = self
                .entries
                .entry(code.clone())
                .or_insert(CodeEntry {
                    challenge: challenge.to_string(),
                    ttl,
                })
                .await;
            if entry.is_fresh() {
                return Ok(code);
            }
            debug!(attempt, "authorization code collided with a live entry, retrying");
        }
        Err(OidcTesterError::CodeSpaceExhausted(total_attempts))
    }
}

fn short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

fn wide_code() -> String {
    Uuid::new_v4().simple().to_string()
}
