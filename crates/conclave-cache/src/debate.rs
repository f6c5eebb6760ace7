use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use conclave_models::Debate;
use moka::future::Cache;
use moka::Expiry;
use tracing::debug;

/// A memoized debate plus the window it is valid for.
#[derive(Debug, Clone)]
pub struct CachedDebate {
    pub debate: Arc<Debate>,
    pub ttl: Duration,
    /// Absolute expiry: insertion time + ttl.
    pub expires_at: DateTime<Utc>,
}

/// Each entry lives exactly as long as the ttl it was inserted with.
/// Reads do not extend it.
struct PerEntryTtl;

impl Expiry<String, CachedDebate> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedDebate,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Per-subject debate throttle backed by moka.
///
/// Concurrent callers for the same subject share one in-flight computation.
/// Failed computations are never stored.
pub struct DebateCache {
    inner: Cache<String, CachedDebate>,
}

impl DebateCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    /// Return the cached debate for `subject`, or run `compute` and cache its
    /// result for `ttl`.
    ///
    /// On error the cache is left untouched and the error is handed back to
    /// every caller that was waiting on this computation.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        subject: &str,
        compute: F,
        ttl: Duration,
    ) -> Result<Debate, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Debate, E>>,
        E: Send + Sync + 'static,
    {
        let mut computed = false;
        let entry = self
            .inner
            .try_get_with(subject.to_string(), async {
                computed = true;
                let debate = compute().await?;
                let expires_at = Utc::now()
                    + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
                Ok::<_, E>(CachedDebate {
                    debate: Arc::new(debate),
                    ttl,
                    expires_at,
                })
            })
            .await?;

        if computed {
            debug!(subject, expires_at = %entry.expires_at, "Debate computed and cached");
        } else {
            debug!(subject, expires_at = %entry.expires_at, "Debate cache hit");
        }

        Ok(entry.debate.as_ref().clone())
    }

    /// Absolute expiry of the live entry for `subject`, if any.
    pub async fn expires_at(&self, subject: &str) -> Option<DateTime<Utc>> {
        self.inner.get(subject).await.map(|entry| entry.expires_at)
    }

    pub async fn invalidate(&self, subject: &str) {
        self.inner.invalidate(subject).await;
    }

    /// Approximate; moka applies pending maintenance lazily.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}
