//! Inbound Undo: reverse a prior Follow, Like, or Announce.
//!
//! Federation gives no ordering guarantee, so an Undo can arrive before
//! the activity it reverses. Nothing-to-undo is therefore a success, not
//! a failure.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::{Activity, ObjectRef};
use akari_common::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

pub struct UndoHandler;

impl UndoHandler {
    async fn undo_follow(
        &self,
        ctx: &HandlerContext,
        actor_id: &str,
        inner: &Value,
    ) -> AppResult<HandlerResult> {
        let Some(followee_uri) = inner_object_uri(inner) else {
            return Ok(HandlerResult::fail("undone follow has no target"));
        };
        let Some(followee) = ctx.find_local_by_uri(&followee_uri).await? else {
            return Ok(HandlerResult::ok("nothing to undo"));
        };

        if !ctx.follows.is_following(actor_id, &followee.id).await? {
            return Ok(HandlerResult::ok("nothing to undo"));
        }
        ctx.follows.delete_by_pair(actor_id, &followee.id).await?;

        info!(followee = %followee.username, "Follow undone");
        Ok(HandlerResult::ok("follow undone"))
    }

    async fn undo_like(
        &self,
        ctx: &HandlerContext,
        actor_id: &str,
        inner: &Value,
    ) -> AppResult<HandlerResult> {
        let Some(note_uri) = inner_object_uri(inner) else {
            return Ok(HandlerResult::fail("undone like has no target"));
        };
        let Some(note) = ctx.find_note_by_uri(&note_uri).await? else {
            return Ok(HandlerResult::ok("nothing to undo"));
        };

        if ctx
            .reactions
            .find_by_user_and_note(actor_id, &note.id)
            .await?
            .is_none()
        {
            return Ok(HandlerResult::ok("nothing to undo"));
        }
        ctx.reactions
            .delete_by_user_and_note(actor_id, &note.id)
            .await?;

        info!(note_id = %note.id, "Reaction undone");
        Ok(HandlerResult::ok("reaction undone"))
    }

    async fn undo_announce(
        &self,
        ctx: &HandlerContext,
        actor_id: &str,
        renote_uri: &str,
    ) -> AppResult<HandlerResult> {
        match ctx.notes.find_by_uri(renote_uri).await? {
            Some(renote) if renote.user_id == actor_id && renote.renote_id.is_some() => {
                ctx.notes
                    .soft_delete(
                        &renote.id,
                        Some(actor_id.to_string()),
                        Some("remote undo".to_string()),
                    )
                    .await?;
                info!(renote = %renote.id, "Renote undone");
                Ok(HandlerResult::ok("renote undone"))
            }
            _ => Ok(HandlerResult::ok("nothing to undo")),
        }
    }
}

#[async_trait]
impl ActivityHandler for UndoHandler {
    fn activity_type(&self) -> &'static str {
        "Undo"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let Some(actor) = ctx.resolver.resolve_actor(&actor_uri, false).await? else {
            return Ok(HandlerResult::fail("actor could not be resolved"));
        };

        match &activity.object {
            Some(ObjectRef::Embedded(inner)) => {
                match inner.get("type").and_then(Value::as_str) {
                    Some("Follow") => self.undo_follow(ctx, &actor.id, inner).await,
                    Some("Like") | Some("EmojiReact") => {
                        self.undo_like(ctx, &actor.id, inner).await
                    }
                    Some("Announce") => match inner.get("id").and_then(Value::as_str) {
                        Some(renote_uri) => self.undo_announce(ctx, &actor.id, renote_uri).await,
                        None => Ok(HandlerResult::ok("nothing to undo")),
                    },
                    other => Ok(HandlerResult::ok(format!(
                        "undo for {} noted but not processed",
                        other.unwrap_or("unknown")
                    ))),
                }
            }
            // A bare URI names the undone activity itself; the only row
            // we key by activity URI is a renote.
            Some(ObjectRef::Uri(uri)) => self.undo_announce(ctx, &actor.id, uri.as_str()).await,
            None => Ok(HandlerResult::fail("missing undo object")),
        }
    }
}

/// The `object` of a wrapped activity, as a URI.
fn inner_object_uri(inner: &Value) -> Option<String> {
    match inner.get("object") {
        Some(Value::String(uri)) => Some(uri.clone()),
        Some(Value::Object(obj)) => obj
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        _ => None,
    }
}
