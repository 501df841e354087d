//! Inbound Delete: tombstone a cached remote note or actor.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

pub struct DeleteHandler;

#[async_trait]
impl ActivityHandler for DeleteHandler {
    fn activity_type(&self) -> &'static str {
        "Delete"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        // Both a bare tombstone URI and a full embedded object are legal.
        let Some(object_uri) = activity.object_uri() else {
            return Ok(HandlerResult::fail("delete object has no resolvable id"));
        };

        // Actor deleting itself: tombstone the cached account.
        if object_uri == actor_uri {
            if let Some(mut actor) = ctx.users.find_by_uri(&object_uri).await? {
                actor.is_deleted = true;
                ctx.users.update(actor).await?;
                info!(uri = %object_uri, "Remote actor tombstoned");
                return Ok(HandlerResult::ok("actor deleted"));
            }
            // An actor we never cached: nothing to delete.
            return Ok(HandlerResult::ok("actor not cached, nothing to delete"));
        }

        match ctx.notes.find_by_uri(&object_uri).await? {
            Some(note) => {
                let deleted_by = ctx
                    .users
                    .find_by_uri(&actor_uri)
                    .await?
                    .map(|actor| actor.id);
                ctx.notes
                    .soft_delete(&note.id, deleted_by, Some("remote delete".to_string()))
                    .await?;
                info!(uri = %object_uri, note_id = %note.id, deleted_at = %Utc::now(), "Remote note deleted");
                Ok(HandlerResult::ok("note deleted"))
            }
            // Deleting something we never saw is an idempotent no-op.
            None => {
                debug!(uri = %object_uri, "Delete for unknown object");
                Ok(HandlerResult::ok("object not cached, nothing to delete"))
            }
        }
    }
}
