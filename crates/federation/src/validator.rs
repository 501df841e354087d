//! Structural validation of inbound activities.
//!
//! All functions are pure over the parsed payload. Violations accumulate:
//! callers get the complete error set in one pass, never just the first
//! failure.

use crate::activity::Activity;
use chrono::{DateTime, Duration, Utc};
use url::Url;

/// How far in the past a `published` timestamp may lie, in hours.
/// Delivery retry queues legitimately delay federation for hours, so
/// this is generous.
const MAX_TIMESTAMP_AGE_HOURS: i64 = 24;

/// How far in the future a `published` timestamp may lie, in hours.
/// Clock skew only, so this is narrow.
const MAX_TIMESTAMP_SKEW_HOURS: i64 = 1;

/// A single structural violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Format accumulated errors into one diagnostic line.
#[must_use]
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// True when `s` parses as an absolute `http`/`https` URL. Any other
/// scheme, and relative paths, are invalid.
#[must_use]
pub fn is_valid_uri(s: &str) -> bool {
    Url::parse(s).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// True when `s` parses as a timestamp no older than 24 hours and no
/// more than 1 hour in the future. The window is deliberately
/// asymmetric: stale replays beyond a day are suspicious, but future
/// timestamps only arise from clock skew.
#[must_use]
pub fn is_valid_timestamp(s: &str) -> bool {
    let Ok(ts) = DateTime::parse_from_rfc3339(s) else {
        return false;
    };
    let ts = ts.with_timezone(&Utc);
    let now = Utc::now();

    ts >= now - Duration::hours(MAX_TIMESTAMP_AGE_HOURS)
        && ts <= now + Duration::hours(MAX_TIMESTAMP_SKEW_HOURS)
}

/// Check type-dependent required fields, accumulating every violation.
#[must_use]
pub fn validate_required_fields(activity: &Activity) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if activity.kind.is_empty() {
        errors.push(ValidationError::new("type", "missing activity type"));
    }

    match &activity.actor {
        None => errors.push(ValidationError::new("actor", "missing actor")),
        Some(actor) => match actor.uri() {
            Some(uri) if is_valid_uri(&uri) => {}
            _ => errors.push(ValidationError::new("actor", "actor is not a valid URI")),
        },
    }

    match activity.kind.as_str() {
        "Create" | "Update" | "Delete" | "Announce" => {
            if activity.object.is_none() {
                errors.push(ValidationError::new("object", "missing object"));
            }
        }
        "Follow" | "Like" => match &activity.object {
            None => errors.push(ValidationError::new("object", "missing object")),
            Some(object) => {
                if let Some(uri) = object.uri() {
                    if !is_valid_uri(&uri) {
                        errors.push(ValidationError::new(
                            "object",
                            "object is not a valid URI",
                        ));
                    }
                }
            }
        },
        "Accept" | "Reject" | "Undo" => match &activity.object {
            None => errors.push(ValidationError::new("object", "missing object")),
            Some(object) => {
                if object.embedded().is_some() && object.object_type().is_none() {
                    errors.push(ValidationError::new(
                        "object",
                        "wrapped activity is missing its type",
                    ));
                }
            }
        },
        _ => {}
    }

    errors
}

/// Verify the signing `keyId` belongs to the activity's claimed actor.
///
/// Both `#main-key` fragments and `/publickey` path suffixes satisfy the
/// prefix check. Skips silently when no `keyId` was supplied: that case
/// belongs to the signature layer.
#[must_use]
pub fn validate_actor_key_id_consistency(
    activity: &Activity,
    key_id: Option<&str>,
) -> Vec<ValidationError> {
    let Some(key_id) = key_id else {
        return Vec::new();
    };
    let Some(actor_uri) = activity.actor_uri() else {
        // Missing actor is reported by validate_required_fields.
        return Vec::new();
    };

    if key_id.starts_with(&actor_uri) {
        Vec::new()
    } else {
        vec![ValidationError::new(
            "actor",
            format!("keyId {key_id} does not belong to actor {actor_uri}"),
        )]
    }
}

/// Full structural validation: required fields, timestamp window, and
/// actor/keyId consistency. Returns the union of all violations.
#[must_use]
pub fn validate_activity(activity: &Activity, key_id: Option<&str>) -> Vec<ValidationError> {
    let mut errors = validate_required_fields(activity);

    if let Some(published) = &activity.published {
        if !is_valid_timestamp(published) {
            errors.push(ValidationError::new(
                "published",
                "timestamp is invalid or outside the accepted window",
            ));
        }
    }

    errors.extend(validate_actor_key_id_consistency(activity, key_id));
    errors
}
