//! Persistence collaborators for akari.
//!
//! The federation core mutates state exclusively through the narrow
//! repository traits defined here ([`UserStore`], [`FollowStore`],
//! [`NoteStore`], [`ReactionStore`]). Every operation is an individually
//! atomic single-row insert/update/upsert keyed by natural identity; the
//! design deliberately avoids multi-statement transactions and accepts
//! at-least-once semantics typical of federation.
//!
//! [`memory`] provides the in-process implementation used by the server
//! binary and the test suite. A SQL-backed implementation plugs in behind
//! the same traits.

pub mod entities;
pub mod memory;

use akari_common::AppResult;
use async_trait::async_trait;

use entities::{Actor, Follow, Note, Reaction};

/// Repository for actors, local and remote.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find an actor by internal id.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Actor>>;

    /// Find an actor by canonical `ActivityPub` URI.
    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Actor>>;

    /// Find an actor by username and host (`None` host = local).
    async fn find_by_username(&self, username: &str, host: Option<&str>)
    -> AppResult<Option<Actor>>;

    /// Insert a new actor.
    async fn create(&self, actor: Actor) -> AppResult<Actor>;

    /// Replace an existing actor row by id.
    async fn update(&self, actor: Actor) -> AppResult<Actor>;
}

/// Repository for follow relationships.
///
/// Invariant: at most one active [`Follow`] per (follower, followee) pair.
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Insert a follow relationship. Upserts on the (follower, followee) pair.
    async fn create(&self, follow: Follow) -> AppResult<Follow>;

    /// Find a follow by follower and followee id.
    async fn find_by_pair(&self, follower_id: &str, followee_id: &str)
    -> AppResult<Option<Follow>>;

    /// Check whether follower follows followee.
    async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool>;

    /// Delete a follow by pair. Deleting a missing pair is a no-op.
    async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<()>;

    /// All follows where `followee_id` is the followee (i.e. their followers).
    async fn find_followers(&self, followee_id: &str) -> AppResult<Vec<Follow>>;
}

/// Repository for notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Find a note by internal id.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Note>>;

    /// Find a note by remote `ActivityPub` URI.
    async fn find_by_uri(&self, uri: &str) -> AppResult<Option<Note>>;

    /// Insert a new note.
    async fn create(&self, note: Note) -> AppResult<Note>;

    /// Replace an existing note row by id.
    async fn update(&self, note: Note) -> AppResult<Note>;

    /// Soft-delete a note, preserving the row for federation history.
    /// `deleted_by_id` records which actor performed the deletion.
    async fn soft_delete(
        &self,
        id: &str,
        deleted_by_id: Option<String>,
        reason: Option<String>,
    ) -> AppResult<()>;
}

/// Repository for reactions (Likes and Misskey-style emoji reactions).
#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Insert a reaction.
    async fn create(&self, reaction: Reaction) -> AppResult<Reaction>;

    /// Find a reaction by reacting actor and note.
    async fn find_by_user_and_note(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> AppResult<Option<Reaction>>;

    /// Delete a reaction by reacting actor and note. Missing pair is a no-op.
    async fn delete_by_user_and_note(&self, user_id: &str, note_id: &str) -> AppResult<()>;
}
