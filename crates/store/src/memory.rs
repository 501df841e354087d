//! In-memory store implementations.
//!
//! Used by the server binary when no SQL backend is configured and by the
//! test suite. Each store is a `RwLock`-guarded map; every trait method is
//! a single atomic mutation keyed by natural identity, matching the
//! contract SQL implementations must honor.

use std::collections::HashMap;
use std::sync::Arc;

use akari_common::{AppError, AppResult};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::entities::{Actor, Follow, Note, Reaction};
use crate::{FollowStore, NoteStore, ReactionStore, UserStore};

/// In-memory [`UserStore`].
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    actors: Arc<RwLock<HashMap<String, Actor>>>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Actor>> {
        Ok(self.actors.read().await.get(id).cloned())
    }

    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Actor>> {
        Ok(self
            .actors
            .read()
            .await
            .values()
            .find(|a| a.uri.as_deref() == Some(uri))
            .cloned())
    }

    async fn find_by_username(
        &self,
        username: &str,
        host: Option<&str>,
    ) -> AppResult<Option<Actor>> {
        Ok(self
            .actors
            .read()
            .await
            .values()
            .find(|a| a.username == username && a.host.as_deref() == host)
            .cloned())
    }

    async fn create(&self, actor: Actor) -> AppResult<Actor> {
        let mut actors = self.actors.write().await;
        if actors.contains_key(&actor.id) {
            return Err(AppError::Conflict(format!(
                "Actor already exists: {}",
                actor.id
            )));
        }
        actors.insert(actor.id.clone(), actor.clone());
        Ok(actor)
    }

    async fn update(&self, actor: Actor) -> AppResult<Actor> {
        let mut actors = self.actors.write().await;
        if !actors.contains_key(&actor.id) {
            return Err(AppError::ActorNotFound(actor.id.clone()));
        }
        actors.insert(actor.id.clone(), actor.clone());
        Ok(actor)
    }
}

/// In-memory [`FollowStore`].
#[derive(Clone, Default)]
pub struct MemoryFollowStore {
    // Keyed by (follower_id, followee_id) to enforce the one-active-follow
    // invariant.
    follows: Arc<RwLock<HashMap<(String, String), Follow>>>,
}

impl MemoryFollowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FollowStore for MemoryFollowStore {
    async fn create(&self, follow: Follow) -> AppResult<Follow> {
        let key = (follow.follower_id.clone(), follow.followee_id.clone());
        self.follows.write().await.insert(key, follow.clone());
        Ok(follow)
    }

    async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<Follow>> {
        let key = (follower_id.to_string(), followee_id.to_string());
        Ok(self.follows.read().await.get(&key).cloned())
    }

    async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let key = (follower_id.to_string(), followee_id.to_string());
        self.follows.write().await.remove(&key);
        Ok(())
    }

    async fn find_followers(&self, followee_id: &str) -> AppResult<Vec<Follow>> {
        Ok(self
            .follows
            .read()
            .await
            .values()
            .filter(|f| f.followee_id == followee_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`NoteStore`].
#[derive(Clone, Default)]
pub struct MemoryNoteStore {
    notes: Arc<RwLock<HashMap<String, Note>>>,
}

impl MemoryNoteStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Note>> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Note>> {
        Ok(self
            .notes
            .read()
            .await
            .values()
            .find(|n| n.uri.as_deref() == Some(uri))
            .cloned())
    }

    async fn create(&self, note: Note) -> AppResult<Note> {
        let mut notes = self.notes.write().await;
        if notes.contains_key(&note.id) {
            return Err(AppError::Conflict(format!("Note already exists: {}", note.id)));
        }
        notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }

    async fn update(&self, note: Note) -> AppResult<Note> {
        let mut notes = self.notes.write().await;
        if !notes.contains_key(&note.id) {
            return Err(AppError::NoteNotFound(note.id.clone()));
        }
        notes.insert(note.id.clone(), note.clone());
        Ok(note)
    }

    async fn soft_delete(
        &self,
        id: &str,
        deleted_by_id: Option<String>,
        reason: Option<String>,
    ) -> AppResult<()> {
        let mut notes = self.notes.write().await;
        let note = notes
            .get_mut(id)
            .ok_or_else(|| AppError::NoteNotFound(id.to_string()))?;
        note.is_deleted = true;
        note.deleted_at = Some(Utc::now());
        note.deleted_by_id = deleted_by_id;
        note.deletion_reason = reason;
        Ok(())
    }
}

/// In-memory [`ReactionStore`].
#[derive(Clone, Default)]
pub struct MemoryReactionStore {
    reactions: Arc<RwLock<HashMap<(String, String), Reaction>>>,
}

impl MemoryReactionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReactionStore for MemoryReactionStore {
    async fn create(&self, reaction: Reaction) -> AppResult<Reaction> {
        let key = (reaction.user_id.clone(), reaction.note_id.clone());
        self.reactions.write().await.insert(key, reaction.clone());
        Ok(reaction)
    }

    async fn find_by_user_and_note(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> AppResult<Option<Reaction>> {
        let key = (user_id.to_string(), note_id.to_string());
        Ok(self.reactions.read().await.get(&key).cloned())
    }

    async fn delete_by_user_and_note(&self, user_id: &str, note_id: &str) -> AppResult<()> {
        let key = (user_id.to_string(), note_id.to_string());
        self.reactions.write().await.remove(&key);
        Ok(())
    }
}
