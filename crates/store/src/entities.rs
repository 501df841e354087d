//! Entity types shared between the stores and the federation core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An actor: a local user or a cached remote account.
///
/// Exactly one of two shapes holds: `host == None` (local, must own a
/// keypair) or `host == Some(..)` (remote, public key only, populated
/// lazily on first resolution). Remote actors are never hard-deleted;
/// a Delete activity tombstones them via `is_deleted`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,

    pub username: String,

    /// NULL = local user, Some(host) = remote user.
    pub host: Option<String>,

    /// Canonical `ActivityPub` URI. None for local-only users.
    pub uri: Option<String>,

    /// Display name.
    pub name: Option<String>,

    /// Profile description.
    pub description: Option<String>,

    /// Personal inbox URL (remote actors).
    pub inbox: Option<String>,

    /// Shared inbox URL, preferred for fan-out when present.
    pub shared_inbox: Option<String>,

    /// Public key in SPKI PEM format.
    pub public_key: Option<String>,

    /// Private key in PKCS#8 PEM format. Local actors only.
    pub private_key: Option<String>,

    /// Account URIs this actor also claims, used for Move validation.
    pub also_known_as: Vec<String>,

    /// Terminal migration pointer set by a validated Move.
    pub moved_to: Option<String>,

    /// When the migration was recorded.
    pub moved_at: Option<DateTime<Utc>>,

    /// Does this account require manual follow approval?
    pub is_locked: bool,

    /// Is this account suspended by moderation?
    pub is_suspended: bool,

    /// Tombstone marker for deleted remote actors.
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,

    /// Last successful remote fetch, for cache freshness.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Actor {
    /// Whether this actor lives on this instance.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.host.is_none()
    }

    /// Best inbox URL for delivery: shared inbox when available.
    #[must_use]
    pub fn delivery_inbox(&self) -> Option<&str> {
        self.shared_inbox.as_deref().or(self.inbox.as_deref())
    }
}

/// A follow relationship. At most one active row per (follower, followee).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub followee_id: String,
    pub created_at: DateTime<Utc>,
}

/// A post, local or cached remote.
///
/// Soft-delete fields support moderation without losing federation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,

    /// Author actor ID.
    pub user_id: String,

    /// Remote `ActivityPub` URI. None for local notes.
    pub uri: Option<String>,

    /// Note text content.
    pub text: Option<String>,

    /// Renote (boost) target note ID.
    pub renote_id: Option<String>,

    /// Mentioned actor URIs extracted from tags.
    pub mentions: Vec<String>,

    /// Attachment URLs.
    pub attachments: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Actor who performed the deletion.
    pub deleted_by_id: Option<String>,
    pub deletion_reason: Option<String>,
}

/// A reaction: an actor's Like on a note, with optional Misskey-style
/// emoji content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub user_id: String,
    pub note_id: String,

    /// Unicode emoji or `:shortcode:`.
    pub reaction: String,

    /// Image URL when the reaction is a remote custom emoji.
    pub custom_emoji_url: Option<String>,

    pub created_at: DateTime<Utc>,
}
