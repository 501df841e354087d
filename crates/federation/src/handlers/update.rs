//! Inbound Update: patch a cached remote note or actor.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

const ACTOR_TYPES: &[&str] = &["Person", "Service", "Application", "Group", "Organization"];

pub struct UpdateHandler;

#[async_trait]
impl ActivityHandler for UpdateHandler {
    fn activity_type(&self) -> &'static str {
        "Update"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(object) = activity.object.as_ref().and_then(|o| o.embedded()) else {
            return Ok(HandlerResult::fail("update object must be embedded"));
        };
        let Some(object_uri) = object.get("id").and_then(Value::as_str) else {
            return Ok(HandlerResult::fail("updated object has no id"));
        };
        let object_type = object.get("type").and_then(Value::as_str).unwrap_or("");

        if ACTOR_TYPES.contains(&object_type) {
            // Re-fetch through the resolver so the cache and the upsert
            // logic stay in one place.
            return match ctx.resolver.resolve_actor(object_uri, true).await? {
                Some(_) => {
                    info!(uri = %object_uri, "Remote actor refreshed");
                    Ok(HandlerResult::ok("actor updated"))
                }
                None => Ok(HandlerResult::fail("actor could not be refreshed")),
            };
        }

        match ctx.notes.find_by_uri(object_uri).await? {
            Some(mut note) => {
                note.text = object
                    .get("content")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                ctx.notes.update(note).await?;
                info!(uri = %object_uri, "Remote note updated");
                Ok(HandlerResult::ok("note updated"))
            }
            // Update for an object we never saw: fall back to treating it
            // as a Create, since federation gives no ordering guarantee.
            None => super::CreateHandler.handle(activity, ctx).await,
        }
    }
}
