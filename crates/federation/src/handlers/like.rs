//! Inbound Like: record a reaction on a local note.
//!
//! Plain `ActivityPub` Likes carry no reaction content; Misskey-family
//! software extends them with `_misskey_reaction` (or `content`) and,
//! for custom emoji, a `tag` entry holding the image URL.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use akari_store::entities::Reaction;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

const DEFAULT_REACTION: &str = "❤️";

/// Reaction content extracted from a Like activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReaction {
    pub reaction: String,
    pub custom_emoji_url: Option<String>,
}

/// Extract the reaction from a Like.
///
/// `_misskey_reaction` wins over `content`; neither present means the
/// plain-heart default. A `:shortcode:` reaction resolves its image URL
/// through the activity's Emoji tags; a shortcode with no matching tag
/// keeps the text with no URL.
#[must_use]
pub fn extract_reaction_from_like(activity: &Activity) -> ExtractedReaction {
    let reaction = activity
        .misskey_reaction
        .as_deref()
        .or(activity.content.as_deref())
        .unwrap_or(DEFAULT_REACTION)
        .to_string();

    let custom_emoji_url = if reaction.starts_with(':') && reaction.ends_with(':') {
        activity
            .tag
            .iter()
            .find(|tag| tag.kind == "Emoji" && tag.name.as_deref() == Some(reaction.as_str()))
            .and_then(|tag| tag.icon.as_ref())
            .and_then(|icon| icon.url.clone())
    } else {
        None
    };

    ExtractedReaction {
        reaction,
        custom_emoji_url,
    }
}

pub struct LikeHandler;

#[async_trait]
impl ActivityHandler for LikeHandler {
    fn activity_type(&self) -> &'static str {
        "Like"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let Some(object_uri) = activity.object_uri() else {
            return Ok(HandlerResult::fail("missing like target"));
        };

        // A Like can outrun its note's Create; not-found stays soft so
        // the sender's retry can land once the note arrives.
        let Some(note) = ctx.find_note_by_uri(&object_uri).await? else {
            return Ok(HandlerResult::fail("liked note not found"));
        };

        let Some(actor) = ctx.resolver.resolve_actor(&actor_uri, false).await? else {
            return Ok(HandlerResult::fail("liking actor could not be resolved"));
        };

        let extracted = extract_reaction_from_like(activity);
        ctx.reactions
            .create(Reaction {
                id: ctx.id_gen.generate(),
                user_id: actor.id,
                note_id: note.id.clone(),
                reaction: extracted.reaction.clone(),
                custom_emoji_url: extracted.custom_emoji_url,
                created_at: Utc::now(),
            })
            .await?;

        info!(note_id = %note.id, reaction = %extracted.reaction, "Reaction recorded");
        Ok(HandlerResult::ok("reaction recorded"))
    }
}
