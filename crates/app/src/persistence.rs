//! Persistence retry policy — exponential backoff with jitter, a shared
//! degraded flag, and a loop that retries a fallible write indefinitely
//! rather than surfacing the failure to the caller.
//!
//! Storage sinks are expected to call [`retry_until_ok`] around the one
//! fallible operation they perform (a row upsert, a batch flush) instead of
//! propagating the error: persistence failures mark the daemon degraded and
//! publish `persistence/failed`, but never halt it — local state and the
//! event bus keep serving whatever was already accepted.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use minihub_domain::event::Event;

use crate::ports::EventPublisher;

const BASE: Duration = Duration::from_millis(100);
const CAP: Duration = Duration::from_secs(30);
const JITTER_FRACTION: f64 = 0.2;

/// Backoff delay for the given 0-indexed retry attempt: doubling from
/// [`BASE`], capped at [`CAP`], with up to [`JITTER_FRACTION`] of the
/// computed delay added at random so retrying writers don't thunder in
/// lockstep.
#[must_use]
pub fn backoff_for(attempt: u32) -> Duration {
    let doubled = BASE.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = doubled.min(CAP);
    let jitter_max = capped.mul_f64(JITTER_FRACTION);
    let jitter = rand::thread_rng().gen_range(Duration::ZERO..=jitter_max.max(Duration::from_millis(1)));
    capped + jitter
}

/// Shared, cheaply-cloneable flag tracking whether a storage sink's writes
/// are currently succeeding. Surfaced by the `/health` endpoint.
#[derive(Clone, Default)]
pub struct PersistenceHealth {
    degraded: Arc<AtomicBool>,
}

impl PersistenceHealth {
    /// A fresh, non-degraded handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether writes are currently succeeding.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.degraded.load(Ordering::Relaxed)
    }

    /// Mark degraded; returns `true` the first time (the transition into
    /// degraded), `false` on every subsequent call while already degraded.
    fn mark_degraded(&self) -> bool {
        !self.degraded.swap(true, Ordering::Relaxed)
    }

    /// Mark recovered; returns `true` the first time (the transition out of
    /// degraded), `false` if already healthy.
    fn mark_recovered(&self) -> bool {
        self.degraded.swap(false, Ordering::Relaxed)
    }
}

/// Retry `write` until it succeeds, with exponential backoff and jitter
/// between attempts. Never returns `Err`: a failure only ever delays the
/// next attempt. Publishes `persistence/failed` on the transition into
/// degraded and logs the eventual recovery; `write` is otherwise opaque to
/// this function.
pub async fn retry_until_ok<EP, F, Fut, T, E>(health: &PersistenceHealth, publisher: &EP, mut write: F) -> T
where
    EP: EventPublisher,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match write().await {
            Ok(value) => {
                if health.mark_recovered() {
                    tracing::info!("persistence write recovered after failures");
                }
                return value;
            }
            Err(err) => {
                if health.mark_degraded() {
                    tracing::error!(error = %err, "persistence write failed, marking degraded");
                    let _ = publisher
                        .publish(Event::new(
                            "persistence/failed",
                            serde_json::json!({"error": err.to_string()}),
                        ))
                        .await;
                } else {
                    tracing::warn!(error = %err, attempt, "persistence write still failing");
                }
                tokio::time::sleep(backoff_for(attempt)).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
