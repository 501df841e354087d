//! Remote actor resolution with a store-backed cache.

use crate::client::ApClient;
use akari_common::{AppError, AppResult, IdGenerator};
use akari_store::UserStore;
use akari_store::entities::Actor;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Strip the key-reference suffix from a `keyId` to recover the actor
/// URI. Handles both the `#main-key` fragment and the `/publickey` path
/// conventions.
#[must_use]
pub fn actor_uri_from_key_id(key_id: &str) -> &str {
    let without_fragment = key_id.split('#').next().unwrap_or(key_id);
    without_fragment
        .strip_suffix("/publickey")
        .unwrap_or(without_fragment)
}

/// Resolves actor URIs to cached or freshly-fetched [`Actor`] rows.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    /// Resolve an actor by URI. `force_refresh` bypasses the cache,
    /// which Move validation requires. Unresolvable actors are `None`,
    /// not an error.
    async fn resolve_actor(&self, uri: &str, force_refresh: bool) -> AppResult<Option<Actor>>;
}

/// Store-backed resolver that fetches over HTTP on cache miss.
pub struct RemoteActorResolver {
    users: Arc<dyn UserStore>,
    client: Arc<ApClient>,
    id_gen: IdGenerator,
}

impl RemoteActorResolver {
    pub fn new(users: Arc<dyn UserStore>, client: Arc<ApClient>) -> Self {
        Self {
            users,
            client,
            id_gen: IdGenerator::new(),
        }
    }

    async fn fetch_and_upsert(&self, uri: &str, cached: Option<Actor>) -> AppResult<Option<Actor>> {
        let document = match self.client.fetch_actor(uri).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(uri = %uri, error = %e, "Remote actor fetch failed");
                // A stale cache entry beats nothing when the remote is down.
                return Ok(cached);
            }
        };

        let host = url::Url::parse(&document.id)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
            .ok_or_else(|| AppError::Federation(format!("actor id has no host: {}", document.id)))?;

        let now = Utc::now();
        let updated = Actor {
            id: cached
                .as_ref()
                .map_or_else(|| self.id_gen.generate(), |c| c.id.clone()),
            username: document
                .preferred_username
                .clone()
                .unwrap_or_else(|| host.clone()),
            host: Some(host),
            uri: Some(document.id.clone()),
            name: document.name.clone(),
            description: document.summary.clone(),
            inbox: Some(document.inbox.clone()),
            shared_inbox: document
                .endpoints
                .as_ref()
                .and_then(|e| e.shared_inbox.clone()),
            public_key: document.public_key.as_ref().map(|k| k.public_key_pem.clone()),
            private_key: None,
            also_known_as: document.also_known_as.clone(),
            moved_to: document.moved_to.clone(),
            moved_at: cached.as_ref().and_then(|c| c.moved_at),
            is_locked: document.manually_approves_followers,
            is_suspended: cached.as_ref().is_some_and(|c| c.is_suspended),
            is_deleted: false,
            created_at: cached.as_ref().map_or(now, |c| c.created_at),
            last_fetched_at: Some(now),
        };

        let stored = if cached.is_some() {
            self.users.update(updated).await?
        } else {
            self.users.create(updated).await?
        };

        debug!(uri = %uri, "Cached remote actor");
        Ok(Some(stored))
    }
}

#[async_trait]
impl ActorResolver for RemoteActorResolver {
    async fn resolve_actor(&self, uri: &str, force_refresh: bool) -> AppResult<Option<Actor>> {
        let cached = self.users.find_by_uri(uri).await?;

        match cached {
            Some(actor) if !force_refresh => Ok(Some(actor)),
            cached => self.fetch_and_upsert(uri, cached).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_uri_from_key_id() {
        assert_eq!(
            actor_uri_from_key_id("https://remote.example/users/alice#main-key"),
            "https://remote.example/users/alice"
        );
        assert_eq!(
            actor_uri_from_key_id("https://remote.example/users/alice/publickey"),
            "https://remote.example/users/alice"
        );
        assert_eq!(
            actor_uri_from_key_id("https://remote.example/users/alice"),
            "https://remote.example/users/alice"
        );
    }
}
