//! Outbound activity delivery.
//!
//! [`Deliverer`] is the single-inbox transport seam; [`DeliveryService`]
//! layers activity construction and batch fan-out on top. Fan-out is
//! partial-failure-tolerant: one unreachable remote server never blocks
//! delivery to the rest.

use crate::client::ApClient;
use crate::signature::HttpSigner;
use akari_common::IdGenerator;
use akari_store::entities::Actor;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Signing failed: {0}")]
    Signing(#[from] crate::signature::SignatureError),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Delivery failed: {0}")]
    Transport(String),
    #[error("Sender has no private key")]
    MissingKey,
}

/// Outcome of a batch fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Transport for a single signed delivery to one inbox.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(
        &self,
        activity: &Value,
        inbox_url: &str,
        key_id: &str,
        private_key_pem: &str,
    ) -> Result<(), DeliveryError>;
}

/// HTTP transport backed by [`ApClient`].
pub struct HttpDeliverer {
    client: Arc<ApClient>,
}

impl HttpDeliverer {
    pub fn new(client: Arc<ApClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Deliverer for HttpDeliverer {
    async fn deliver(
        &self,
        activity: &Value,
        inbox_url: &str,
        key_id: &str,
        private_key_pem: &str,
    ) -> Result<(), DeliveryError> {
        let signer = HttpSigner::new(private_key_pem, key_id.to_string())?;
        let body = serde_json::to_vec(activity)?;

        match self.client.post_signed(inbox_url, &body, &signer).await {
            Ok(()) => Ok(()),
            // Gone means the recipient is deleted for good; treat the
            // delivery as done rather than a retryable failure.
            Err(crate::client::ApClientError::Gone(url)) => {
                warn!(inbox = %url, "Recipient is gone, dropping delivery");
                Ok(())
            }
            Err(e) => Err(DeliveryError::Transport(e.to_string())),
        }
    }
}

/// Activity construction plus delivery orchestration.
pub struct DeliveryService {
    deliverer: Arc<dyn Deliverer>,
    base_url: String,
    id_gen: IdGenerator,
}

impl DeliveryService {
    pub fn new(deliverer: Arc<dyn Deliverer>, base_url: String) -> Self {
        Self {
            deliverer,
            base_url,
            id_gen: IdGenerator::new(),
        }
    }

    fn activity_id(&self) -> String {
        format!("{}/activities/{}", self.base_url, self.id_gen.generate())
    }

    /// Build an outbound Follow activity.
    #[must_use]
    pub fn build_follow(&self, follower_uri: &str, followee_uri: &str) -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": self.activity_id(),
            "type": "Follow",
            "actor": follower_uri,
            "object": followee_uri,
        })
    }

    /// Build an Accept wrapping a received Follow.
    #[must_use]
    pub fn build_accept(&self, local_actor_uri: &str, follow_activity: Value) -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": self.activity_id(),
            "type": "Accept",
            "actor": local_actor_uri,
            "object": follow_activity,
        })
    }

    /// Build an Undo wrapping a previously-sent Follow.
    #[must_use]
    pub fn build_undo_follow(&self, follower_uri: &str, followee_uri: &str) -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": self.activity_id(),
            "type": "Undo",
            "actor": follower_uri,
            "object": {
                "type": "Follow",
                "actor": follower_uri,
                "object": followee_uri,
            },
        })
    }

    /// Build a self-referential Delete for an actor being erased.
    #[must_use]
    pub fn build_delete_actor(&self, actor_uri: &str) -> Value {
        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": self.activity_id(),
            "type": "Delete",
            "actor": actor_uri,
            "object": actor_uri,
        })
    }

    /// Sign and deliver one activity to one inbox on behalf of `sender`.
    pub async fn deliver_as(
        &self,
        sender: &Actor,
        activity: &Value,
        inbox_url: &str,
    ) -> Result<(), DeliveryError> {
        let private_key = sender.private_key.as_deref().ok_or(DeliveryError::MissingKey)?;
        let key_id = sender_key_id(sender, &self.base_url);

        self.deliverer
            .deliver(activity, inbox_url, &key_id, private_key)
            .await
    }

    /// Fan an activity out to every distinct inbox of `recipients`.
    /// Shared inboxes are deduplicated. Failures are counted, never
    /// propagated.
    pub async fn deliver_to_all(
        &self,
        sender: &Actor,
        activity: &Value,
        recipients: &[Actor],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for inbox in delivery_inboxes(recipients) {
            match self.deliver_as(sender, activity, &inbox).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(inbox = %inbox, error = %e, "Delivery to inbox failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Fan-out complete"
        );
        report
    }

    /// Announce an actor's deletion to every inbox that knows them.
    pub async fn deliver_delete_actor(&self, sender: &Actor, recipients: &[Actor]) -> DeliveryReport {
        let Some(uri) = sender.uri.as_deref() else {
            warn!(actor_id = %sender.id, "Cannot announce deletion of actor without a URI");
            return DeliveryReport::default();
        };
        let activity = self.build_delete_actor(uri);
        self.deliver_to_all(sender, &activity, recipients).await
    }
}

/// Canonical `ActivityPub` URI for a local actor, derived from the
/// `/users/{username}` convention when no explicit URI is stored.
#[must_use]
pub fn local_actor_uri(actor: &Actor, base_url: &str) -> String {
    actor
        .uri
        .clone()
        .unwrap_or_else(|| format!("{base_url}/users/{}", actor.username))
}

/// Canonical `keyId` for a local sender.
#[must_use]
pub fn sender_key_id(sender: &Actor, base_url: &str) -> String {
    format!("{}#main-key", local_actor_uri(sender, base_url))
}

/// Distinct inbox URLs for a recipient set, preferring shared inboxes.
#[must_use]
pub fn delivery_inboxes(recipients: &[Actor]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut inboxes = Vec::new();

    for recipient in recipients {
        if let Some(inbox) = recipient.delivery_inbox() {
            if seen.insert(inbox.to_string()) {
                inboxes.push(inbox.to_string());
            }
        }
    }

    inboxes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn remote(username: &str, inbox: &str, shared: Option<&str>) -> Actor {
        Actor {
            id: username.to_string(),
            username: username.to_string(),
            host: Some("remote.example".to_string()),
            uri: Some(format!("https://remote.example/users/{username}")),
            name: None,
            description: None,
            inbox: Some(inbox.to_string()),
            shared_inbox: shared.map(ToString::to_string),
            public_key: None,
            private_key: None,
            also_known_as: Vec::new(),
            moved_to: None,
            moved_at: None,
            is_locked: false,
            is_suspended: false,
            is_deleted: false,
            created_at: Utc::now(),
            last_fetched_at: None,
        }
    }

    #[test]
    fn test_shared_inboxes_are_deduplicated() {
        let recipients = vec![
            remote("a", "https://remote.example/users/a/inbox", Some("https://remote.example/inbox")),
            remote("b", "https://remote.example/users/b/inbox", Some("https://remote.example/inbox")),
            remote("c", "https://other.example/users/c/inbox", None),
        ];

        let inboxes = delivery_inboxes(&recipients);
        assert_eq!(
            inboxes,
            vec![
                "https://remote.example/inbox".to_string(),
                "https://other.example/users/c/inbox".to_string(),
            ]
        );
    }

    #[test]
    fn test_build_follow_shape() {
        let service = DeliveryService::new(
            Arc::new(NullDeliverer),
            "https://local.example".to_string(),
        );
        let activity = service.build_follow(
            "https://local.example/users/bob",
            "https://remote.example/users/alice",
        );

        assert_eq!(activity["type"], "Follow");
        assert_eq!(activity["actor"], "https://local.example/users/bob");
        assert_eq!(activity["object"], "https://remote.example/users/alice");
        assert!(
            activity["id"]
                .as_str()
                .unwrap()
                .starts_with("https://local.example/activities/")
        );
    }

    #[test]
    fn test_build_undo_follow_wraps_original() {
        let service = DeliveryService::new(
            Arc::new(NullDeliverer),
            "https://local.example".to_string(),
        );
        let activity = service.build_undo_follow(
            "https://local.example/users/bob",
            "https://remote.example/users/alice",
        );

        assert_eq!(activity["type"], "Undo");
        assert_eq!(activity["object"]["type"], "Follow");
        assert_eq!(activity["object"]["actor"], "https://local.example/users/bob");
        assert_eq!(
            activity["object"]["object"],
            "https://remote.example/users/alice"
        );
    }

    #[tokio::test]
    async fn test_delete_actor_fanout_counts_per_destination() {
        let deliverer = Arc::new(CountingDeliverer::default());
        let service = DeliveryService::new(
            deliverer.clone(),
            "https://local.example".to_string(),
        );

        let mut sender = remote("sender", "unused", None);
        sender.host = None;
        sender.uri = Some("https://local.example/users/sender".to_string());
        sender.private_key = Some(
            akari_common::generate_rsa_keypair().unwrap().private_key_pem,
        );

        let recipients = vec![
            remote("a", "https://remote.example/users/a/inbox", None),
            remote("b", "https://down.example/users/b/inbox", None),
        ];

        let report = service.deliver_delete_actor(&sender, &recipients).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);

        let sent = deliverer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "Delete");
        assert_eq!(sent[0]["object"], "https://local.example/users/sender");
    }

    struct NullDeliverer;

    #[async_trait]
    impl Deliverer for NullDeliverer {
        async fn deliver(
            &self,
            _activity: &Value,
            _inbox_url: &str,
            _key_id: &str,
            _private_key_pem: &str,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    /// Records successful sends; inboxes on `down.example` fail.
    #[derive(Default)]
    struct CountingDeliverer {
        sent: tokio::sync::Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Deliverer for CountingDeliverer {
        async fn deliver(
            &self,
            activity: &Value,
            inbox_url: &str,
            _key_id: &str,
            _private_key_pem: &str,
        ) -> Result<(), DeliveryError> {
            if inbox_url.contains("down.example") {
                return Err(DeliveryError::Transport("connection refused".to_string()));
            }
            self.sent.lock().await.push(activity.clone());
            Ok(())
        }
    }
}
