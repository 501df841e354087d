//! Per-type activity handlers.
//!
//! Each handler implements [`ActivityHandler`] over the shared
//! [`HandlerContext`] and is independently testable with mocked
//! collaborators. Handlers report semantic failures through
//! [`HandlerResult`], never through errors: a well-formed activity that
//! cannot be applied is not a protocol violation.

mod accept;
mod announce;
mod create;
mod delete;
mod follow;
mod like;
mod move_activity;
mod reject;
mod undo;
mod update;

pub use accept::AcceptHandler;
pub use announce::AnnounceHandler;
pub use create::CreateHandler;
pub use delete::DeleteHandler;
pub use follow::FollowHandler;
pub use like::{ExtractedReaction, LikeHandler, extract_reaction_from_like};
pub use move_activity::MoveHandler;
pub use reject::RejectHandler;
pub use undo::UndoHandler;
pub use update::UpdateHandler;

use crate::activity::Activity;
use crate::delivery::DeliveryService;
use crate::resolver::ActorResolver;
use akari_common::{AppResult, IdGenerator};
use akari_store::{FollowStore, NoteStore, ReactionStore, UserStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Result of handling one activity. `success = false` is a semantic
/// rejection, reported to the sender without an error status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResult {
    pub success: bool,
    pub message: String,
}

impl HandlerResult {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The narrow capability set handlers operate on. Handlers must not
/// reach outside this context.
pub struct HandlerContext {
    pub users: Arc<dyn UserStore>,
    pub follows: Arc<dyn FollowStore>,
    pub notes: Arc<dyn NoteStore>,
    pub reactions: Arc<dyn ReactionStore>,
    pub resolver: Arc<dyn ActorResolver>,
    pub delivery: Arc<DeliveryService>,
    pub base_url: String,
    pub id_gen: IdGenerator,
}

impl HandlerContext {
    /// Whether a URI points at this instance.
    #[must_use]
    pub fn is_local_uri(&self, uri: &str) -> bool {
        uri.starts_with(&self.base_url)
    }

    /// Look up a local actor by its canonical URI, falling back to the
    /// `/users/{username}` path convention for rows without a stored URI.
    pub async fn find_local_by_uri(
        &self,
        uri: &str,
    ) -> AppResult<Option<akari_store::entities::Actor>> {
        if let Some(actor) = self.users.find_by_uri(uri).await? {
            return Ok(Some(actor).filter(|a| a.is_local()));
        }

        let Some(username) = uri
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix("/users/"))
        else {
            return Ok(None);
        };
        let username = username.trim_end_matches('/');

        self.users.find_by_username(username, None).await
    }

    /// Backfill a keypair for a local actor created before federation
    /// was enabled. Remote actors and actors that already own a key
    /// pass through untouched.
    pub async fn ensure_keypair(
        &self,
        actor: akari_store::entities::Actor,
    ) -> AppResult<akari_store::entities::Actor> {
        if !actor.is_local() || actor.private_key.is_some() {
            return Ok(actor);
        }
        let keypair = akari_common::generate_rsa_keypair()?;
        let mut actor = actor;
        actor.public_key = Some(keypair.public_key_pem);
        actor.private_key = Some(keypair.private_key_pem);
        self.users.update(actor).await
    }

    /// Look up a note by remote URI, or by id for local notes addressed
    /// through the `/notes/{id}` convention.
    pub async fn find_note_by_uri(
        &self,
        uri: &str,
    ) -> AppResult<Option<akari_store::entities::Note>> {
        if let Some(note) = self.notes.find_by_uri(uri).await? {
            return Ok(Some(note));
        }
        let Some(id) = uri
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix("/notes/"))
        else {
            return Ok(None);
        };
        self.notes.find_by_id(id.trim_end_matches('/')).await
    }
}

/// A handler for one activity type.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// The `type` value this handler accepts.
    fn activity_type(&self) -> &'static str;

    /// Apply the activity. Transport and storage errors propagate;
    /// semantic rejections come back as a failed [`HandlerResult`].
    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult>;
}

/// All handlers known to the dispatcher.
#[must_use]
pub fn all_handlers() -> Vec<Box<dyn ActivityHandler>> {
    vec![
        Box::new(FollowHandler),
        Box::new(AcceptHandler),
        Box::new(RejectHandler),
        Box::new(CreateHandler),
        Box::new(UpdateHandler),
        Box::new(DeleteHandler),
        Box::new(LikeHandler),
        Box::new(AnnounceHandler),
        Box::new(UndoHandler),
        Box::new(MoveHandler),
    ]
}
