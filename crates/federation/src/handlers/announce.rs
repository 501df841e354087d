//! Inbound Announce: record a boost of a known note.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use akari_store::entities::Note;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

pub struct AnnounceHandler;

#[async_trait]
impl ActivityHandler for AnnounceHandler {
    fn activity_type(&self) -> &'static str {
        "Announce"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let Some(object_uri) = activity.object_uri() else {
            return Ok(HandlerResult::fail("missing announce target"));
        };

        // No partial renote: if the original cannot be resolved the whole
        // Announce fails, and the sender may retry after the Create lands.
        let Some(original) = ctx.find_note_by_uri(&object_uri).await? else {
            return Ok(HandlerResult::fail("announced note not found"));
        };

        let Some(booster) = ctx.resolver.resolve_actor(&actor_uri, false).await? else {
            return Ok(HandlerResult::fail("announcing actor could not be resolved"));
        };

        // Duplicate Announce delivery resolves to the same renote row.
        if let Some(existing_uri) = activity.id.as_deref() {
            if ctx.notes.find_by_uri(existing_uri).await?.is_some() {
                return Ok(HandlerResult::ok("renote already known"));
            }
        }

        let renote = ctx
            .notes
            .create(Note {
                id: ctx.id_gen.generate(),
                user_id: booster.id,
                uri: activity.id.clone(),
                text: None,
                renote_id: Some(original.id.clone()),
                mentions: Vec::new(),
                attachments: Vec::new(),
                created_at: Utc::now(),
                is_deleted: false,
                deleted_at: None,
                deleted_by_id: None,
                deletion_reason: None,
            })
            .await?;

        info!(original = %original.id, renote = %renote.id, "Renote recorded");
        Ok(HandlerResult::ok("renote recorded"))
    }
}
