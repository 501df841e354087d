//! Inbound Create: persist a remote note.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use akari_store::entities::Note;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

pub struct CreateHandler;

#[async_trait]
impl ActivityHandler for CreateHandler {
    fn activity_type(&self) -> &'static str {
        "Create"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let Some(object) = activity.object.as_ref().and_then(|o| o.embedded()) else {
            return Ok(HandlerResult::fail("create object must be embedded"));
        };
        let Some(object_uri) = object.get("id").and_then(Value::as_str) else {
            return Ok(HandlerResult::fail("created object has no id"));
        };

        // Duplicate delivery of the same note is an ignore, not an error.
        if ctx.notes.find_by_uri(object_uri).await?.is_some() {
            debug!(uri = %object_uri, "Note already known");
            return Ok(HandlerResult::ok("note already known"));
        }

        let Some(author) = ctx.resolver.resolve_actor(&actor_uri, false).await? else {
            return Ok(HandlerResult::fail("author could not be resolved"));
        };

        let note = Note {
            id: ctx.id_gen.generate(),
            user_id: author.id,
            uri: Some(object_uri.to_string()),
            text: object
                .get("content")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            renote_id: None,
            mentions: extract_mentions(object),
            attachments: extract_attachments(object),
            created_at: object
                .get("published")
                .and_then(Value::as_str)
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc)),
            is_deleted: false,
            deleted_at: None,
            deleted_by_id: None,
            deletion_reason: None,
        };
        let note = ctx.notes.create(note).await?;

        info!(uri = %object_uri, note_id = %note.id, "Remote note persisted");
        Ok(HandlerResult::ok("note created"))
    }
}

/// Mention hrefs from the object's `tag` array.
fn extract_mentions(object: &Value) -> Vec<String> {
    object
        .get("tag")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter(|t| t.get("type").and_then(Value::as_str) == Some("Mention"))
                .filter_map(|t| t.get("href").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Attachment URLs from the object's `attachment` array.
fn extract_attachments(object: &Value) -> Vec<String> {
    object
        .get("attachment")
        .and_then(Value::as_array)
        .map(|attachments| {
            attachments
                .iter()
                .filter_map(|a| a.get("url").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_mentions_and_attachments() {
        let object = json!({
            "id": "https://remote.example/notes/1",
            "type": "Note",
            "content": "hi @bob",
            "tag": [
                {"type": "Mention", "href": "https://local.example/users/bob"},
                {"type": "Hashtag", "name": "#rust"}
            ],
            "attachment": [
                {"type": "Document", "url": "https://remote.example/media/1.png"}
            ]
        });

        assert_eq!(
            extract_mentions(&object),
            vec!["https://local.example/users/bob".to_string()]
        );
        assert_eq!(
            extract_attachments(&object),
            vec!["https://remote.example/media/1.png".to_string()]
        );
    }

    #[test]
    fn test_extract_from_bare_object() {
        let object = json!({"id": "https://remote.example/notes/2", "type": "Note"});
        assert!(extract_mentions(&object).is_empty());
        assert!(extract_attachments(&object).is_empty());
    }
}
