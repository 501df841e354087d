//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use akari_common::{AppResult, IdGenerator, RsaKeypair, generate_rsa_keypair};
use akari_federation::delivery::{Deliverer, DeliveryError, DeliveryService};
use akari_federation::dispatcher::{Dispatcher, InboxRequest};
use akari_federation::handlers::HandlerContext;
use akari_federation::ledger::IdempotencyLedger;
use akari_federation::resolver::ActorResolver;
use akari_federation::signature::HttpSigner;
use akari_store::entities::Actor;
use akari_store::memory::{
    MemoryFollowStore, MemoryNoteStore, MemoryReactionStore, MemoryUserStore,
};
use akari_store::{FollowStore, NoteStore, ReactionStore, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

pub const BASE_URL: &str = "https://local.example";

/// Resolver that answers purely from the user store, no network.
pub struct StaticResolver {
    users: Arc<dyn UserStore>,
}

#[async_trait]
impl ActorResolver for StaticResolver {
    async fn resolve_actor(&self, uri: &str, _force_refresh: bool) -> AppResult<Option<Actor>> {
        self.users.find_by_uri(uri).await
    }
}

/// Deliverer that records every call and fails for configured inboxes
/// or signing keys.
#[derive(Default)]
pub struct MockDeliverer {
    pub deliveries: Mutex<Vec<(String, Value)>>,
    pub failing_inboxes: HashSet<String>,
    pub failing_key_substrings: Vec<String>,
}

impl MockDeliverer {
    pub fn failing_for_key(substring: &str) -> Self {
        Self {
            failing_key_substrings: vec![substring.to_string()],
            ..Self::default()
        }
    }
}

#[async_trait]
impl Deliverer for MockDeliverer {
    async fn deliver(
        &self,
        activity: &Value,
        inbox_url: &str,
        key_id: &str,
        _private_key_pem: &str,
    ) -> Result<(), DeliveryError> {
        if self.failing_inboxes.contains(inbox_url)
            || self
                .failing_key_substrings
                .iter()
                .any(|s| key_id.contains(s.as_str()))
        {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        self.deliveries
            .lock()
            .await
            .push((inbox_url.to_string(), activity.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub users: Arc<MemoryUserStore>,
    pub follows: Arc<MemoryFollowStore>,
    pub notes: Arc<MemoryNoteStore>,
    pub reactions: Arc<MemoryReactionStore>,
    pub deliverer: Arc<MockDeliverer>,
    pub id_gen: IdGenerator,
}

pub fn harness() -> Harness {
    harness_with_deliverer(Arc::new(MockDeliverer::default()))
}

pub fn harness_with_deliverer(deliverer: Arc<MockDeliverer>) -> Harness {
    let users = Arc::new(MemoryUserStore::default());
    let follows = Arc::new(MemoryFollowStore::default());
    let notes = Arc::new(MemoryNoteStore::default());
    let reactions = Arc::new(MemoryReactionStore::default());

    let resolver = Arc::new(StaticResolver {
        users: users.clone() as Arc<dyn UserStore>,
    });
    let delivery = Arc::new(DeliveryService::new(
        deliverer.clone() as Arc<dyn Deliverer>,
        BASE_URL.to_string(),
    ));

    let ctx = HandlerContext {
        users: users.clone() as Arc<dyn UserStore>,
        follows: follows.clone() as Arc<dyn FollowStore>,
        notes: notes.clone() as Arc<dyn NoteStore>,
        reactions: reactions.clone() as Arc<dyn ReactionStore>,
        resolver,
        delivery,
        base_url: BASE_URL.to_string(),
        id_gen: IdGenerator::new(),
    };

    Harness {
        dispatcher: Dispatcher::new(ctx, IdempotencyLedger::default(), 30),
        users,
        follows,
        notes,
        reactions,
        deliverer,
        id_gen: IdGenerator::new(),
    }
}

/// A remote actor with a fresh keypair, inserted into the store.
pub async fn seed_remote_actor(harness: &Harness, username: &str) -> (Actor, RsaKeypair) {
    let keypair = generate_rsa_keypair().expect("keypair generation");
    let uri = format!("https://remote.example/users/{username}");
    let actor = Actor {
        id: harness.id_gen.generate(),
        username: username.to_string(),
        host: Some("remote.example".to_string()),
        uri: Some(uri.clone()),
        name: None,
        description: None,
        inbox: Some(format!("{uri}/inbox")),
        shared_inbox: None,
        public_key: Some(keypair.public_key_pem.clone()),
        private_key: None,
        also_known_as: Vec::new(),
        moved_to: None,
        moved_at: None,
        is_locked: false,
        is_suspended: false,
        is_deleted: false,
        created_at: Utc::now(),
        last_fetched_at: Some(Utc::now()),
    };
    let actor = harness.users.create(actor).await.expect("seed actor");
    (actor, keypair)
}

/// A local actor with a keypair, inserted into the store.
pub async fn seed_local_actor(harness: &Harness, username: &str, is_locked: bool) -> Actor {
    let keypair = generate_rsa_keypair().expect("keypair generation");
    let actor = Actor {
        id: harness.id_gen.generate(),
        username: username.to_string(),
        host: None,
        uri: Some(format!("{BASE_URL}/users/{username}")),
        name: None,
        description: None,
        inbox: None,
        shared_inbox: None,
        public_key: Some(keypair.public_key_pem),
        private_key: Some(keypair.private_key_pem),
        also_known_as: Vec::new(),
        moved_to: None,
        moved_at: None,
        is_locked,
        is_suspended: false,
        is_deleted: false,
        created_at: Utc::now(),
        last_fetched_at: None,
    };
    harness.users.create(actor).await.expect("seed actor")
}

/// Sign an activity the way a remote server would and package it as an
/// inbox request for `POST /inbox`.
pub fn signed_request(activity: &Value, signer_actor: &Actor, keypair: &RsaKeypair) -> InboxRequest {
    let key_id = format!(
        "{}#main-key",
        signer_actor.uri.as_deref().expect("signer uri")
    );
    let signer = HttpSigner::new(&keypair.private_key_pem, key_id).expect("signer");

    let url = Url::parse(&format!("{BASE_URL}/inbox")).expect("inbox url");
    let body = serde_json::to_vec(activity).expect("serialize activity");
    let signed = signer.sign_request("POST", &url, Some(&body)).expect("sign");

    let headers: HashMap<String, String> = signed
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    InboxRequest {
        method: "POST".to_string(),
        path: "/inbox".to_string(),
        headers,
        body,
    }
}
