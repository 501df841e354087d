//! `ActivityStreams` wire types.
//!
//! Activities are transient: they drive mutations but are never persisted
//! verbatim, so the model stays loose where the protocol is loose.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A reference to an actor or object: either a bare URI or an embedded
/// object carrying its own `id`. Remote software mixes both forms freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Uri(Url),
    Embedded(Value),
}

impl ObjectRef {
    /// Resolve to a URI string, handling both forms. Malformed embedded
    /// objects resolve to `None` rather than erroring.
    #[must_use]
    pub fn uri(&self) -> Option<String> {
        match self {
            Self::Uri(url) => Some(url.to_string()),
            Self::Embedded(value) => value
                .get("id")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        }
    }

    /// The `type` of an embedded object, if any. Bare URIs carry no type.
    #[must_use]
    pub fn object_type(&self) -> Option<&str> {
        match self {
            Self::Uri(_) => None,
            Self::Embedded(value) => value.get("type").and_then(Value::as_str),
        }
    }

    /// The embedded JSON object, if this is not a bare URI.
    #[must_use]
    pub fn embedded(&self) -> Option<&Value> {
        match self {
            Self::Uri(_) => None,
            Self::Embedded(value) => Some(value),
        }
    }
}

/// An inbound `ActivityStreams` activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Defaults to empty when absent so validation can report the
    /// missing type alongside any other field errors.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Misskey reaction extension carried on Like activities.
    #[serde(
        rename = "_misskey_reaction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub misskey_reaction: Option<String>,
    /// Some implementations put the reaction in `content` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Emoji tags attached to the activity (custom-emoji reactions).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<EmojiTag>,
}

impl Activity {
    /// The actor URI, handling both bare-URI and embedded forms.
    #[must_use]
    pub fn actor_uri(&self) -> Option<String> {
        self.actor.as_ref().and_then(ObjectRef::uri)
    }

    /// The object URI, handling both bare-URI and embedded forms.
    #[must_use]
    pub fn object_uri(&self) -> Option<String> {
        self.object.as_ref().and_then(ObjectRef::uri)
    }
}

/// A `tag` entry. Only `Emoji` entries matter for reaction lookup, but
/// the shape is shared with mentions and hashtags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiTag {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<EmojiIcon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiIcon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Remote actor document, as fetched from its `id` URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub inbox: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<ActorEndpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_known_as: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<String>,
    #[serde(default)]
    pub manually_approves_followers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_inbox: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub public_key_pem: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actor_as_bare_uri() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "Follow",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/users/bob"
        }))
        .unwrap();

        assert_eq!(activity.kind, "Follow");
        assert_eq!(
            activity.actor_uri().as_deref(),
            Some("https://remote.example/users/alice")
        );
    }

    #[test]
    fn test_actor_as_embedded_object() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "Update",
            "actor": {"id": "https://remote.example/users/alice", "type": "Person"},
            "object": {"id": "https://remote.example/notes/1", "type": "Note"}
        }))
        .unwrap();

        assert_eq!(
            activity.actor_uri().as_deref(),
            Some("https://remote.example/users/alice")
        );
        assert_eq!(
            activity.object.as_ref().and_then(ObjectRef::object_type),
            Some("Note")
        );
    }

    #[test]
    fn test_malformed_embedded_actor_resolves_to_none() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "Like",
            "actor": {"name": "no id here"},
            "object": "https://local.example/notes/1"
        }))
        .unwrap();

        assert!(activity.actor_uri().is_none());
    }

    #[test]
    fn test_misskey_reaction_field() {
        let activity: Activity = serde_json::from_value(json!({
            "type": "Like",
            "actor": "https://remote.example/users/alice",
            "object": "https://local.example/notes/1",
            "_misskey_reaction": "🎉"
        }))
        .unwrap();

        assert_eq!(activity.misskey_reaction.as_deref(), Some("🎉"));
    }
}
