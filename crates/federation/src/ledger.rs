//! Append-only idempotency ledger for inbound activities.
//!
//! Federation senders retry aggressively, so duplicate delivery is
//! normal. The ledger remembers which activities have already been
//! dispatched so a duplicate short-circuits to an ignored no-op instead
//! of re-invoking a handler.

use crate::activity::Activity;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Default retention for ledger entries, in seconds (7 days). Entries
/// older than the validator's 24-hour timestamp window can never be
/// replayed successfully anyway, so a week is comfortably past that.
pub const DEFAULT_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// In-process idempotency ledger keyed by activity identity.
pub struct IdempotencyLedger {
    seen: RwLock<HashMap<String, DateTime<Utc>>>,
    retention: Duration,
}

impl IdempotencyLedger {
    #[must_use]
    pub fn new(retention_secs: i64) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            retention: Duration::seconds(retention_secs),
        }
    }

    /// Ledger key for an activity: its `id` when present, otherwise a
    /// composite of actor, type, object, and published timestamp.
    #[must_use]
    pub fn key_for(activity: &Activity) -> String {
        if let Some(id) = &activity.id {
            return id.clone();
        }
        format!(
            "{}|{}|{}|{}",
            activity.actor_uri().unwrap_or_default(),
            activity.kind,
            activity.object_uri().unwrap_or_default(),
            activity.published.clone().unwrap_or_default(),
        )
    }

    /// Whether the activity was already recorded within the retention
    /// window.
    pub async fn is_duplicate(&self, activity: &Activity) -> bool {
        let key = Self::key_for(activity);
        let cutoff = Utc::now() - self.retention;
        let seen = self.seen.read().await;
        match seen.get(&key) {
            Some(recorded_at) if *recorded_at > cutoff => {
                debug!(key = %key, "Duplicate activity");
                true
            }
            _ => false,
        }
    }

    /// Record a dispatched activity. Callers record only after the
    /// handler ran to completion, so a failed handler leaves room for
    /// the sender's retry to land once the missing state arrives.
    pub async fn record(&self, activity: &Activity) {
        let key = Self::key_for(activity);
        let now = Utc::now();
        let mut seen = self.seen.write().await;

        // Opportunistic pruning keeps the map bounded.
        let cutoff = now - self.retention;
        seen.retain(|_, recorded_at| *recorded_at > cutoff);
        seen.insert(key, now);
    }
}

impl Default for IdempotencyLedger {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_SECS)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(value: serde_json::Value) -> Activity {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_by_id() {
        let ledger = IdempotencyLedger::default();
        let a = activity(json!({
            "type": "Like",
            "id": "https://remote.example/likes/1",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/notes/1"
        }));

        assert!(!ledger.is_duplicate(&a).await);
        ledger.record(&a).await;
        assert!(ledger.is_duplicate(&a).await);
    }

    #[tokio::test]
    async fn test_composite_key_when_id_absent() {
        let ledger = IdempotencyLedger::default();
        let a = activity(json!({
            "type": "Like",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/notes/1",
            "published": "2026-01-01T00:00:00Z"
        }));
        let b = activity(json!({
            "type": "Like",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/notes/2",
            "published": "2026-01-01T00:00:00Z"
        }));

        ledger.record(&a).await;
        assert!(ledger.is_duplicate(&a).await);
        // Different object is a different activity.
        assert!(!ledger.is_duplicate(&b).await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned() {
        let ledger = IdempotencyLedger::new(0);
        let a = activity(json!({
            "type": "Like",
            "id": "https://remote.example/likes/2",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/notes/1"
        }));

        ledger.record(&a).await;
        // Zero retention: the next check sees an expired entry.
        assert!(!ledger.is_duplicate(&a).await);
    }
}
