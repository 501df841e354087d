//! Inbox dispatcher: the single entry point for inbound federation.
//!
//! A request moves through signature verification, structural
//! validation, idempotency, and handler dispatch as a sequential chain.
//! Protocol and auth violations reject with 4xx; a well-formed activity
//! a handler cannot apply answers 200 so the sender does not enter a
//! retry storm over a permanently-unsatisfiable request.

use crate::activity::Activity;
use crate::handlers::{ActivityHandler, HandlerContext, all_handlers};
use crate::ledger::IdempotencyLedger;
use crate::resolver::actor_uri_from_key_id;
use crate::signature::{
    build_signature_string, parse_signature_header, verify_date_header, verify_digest,
    verify_signature,
};
use crate::validator::{format_errors, validate_activity};
use akari_common::AppResult;
use axum::http::StatusCode;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// An inbound inbox request, decoupled from the HTTP framework so the
/// dispatcher is testable without a server.
#[derive(Debug, Clone)]
pub struct InboxRequest {
    pub method: String,
    /// Path including query, as signed in `(request-target)`.
    pub path: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Terminal state of a dispatched inbox request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxOutcome {
    /// Handled successfully.
    Accepted(String),
    /// Deliberately not processed: duplicate or unsupported type.
    Ignored(String),
    /// Protocol or auth violation.
    Rejected { status: StatusCode, reason: String },
    /// Well-formed but semantically unapplicable; answered 200 so the
    /// sender does not retry.
    Failed(String),
}

impl InboxOutcome {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Accepted(_) | Self::Ignored(_) => StatusCode::ACCEPTED,
            Self::Rejected { status, .. } => *status,
            Self::Failed(_) => StatusCode::OK,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Accepted(m) | Self::Ignored(m) | Self::Failed(m) => m,
            Self::Rejected { reason, .. } => reason,
        }
    }

    fn bad_request(reason: impl Into<String>) -> Self {
        Self::Rejected {
            status: StatusCode::BAD_REQUEST,
            reason: reason.into(),
        }
    }

    fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Rejected {
            status: StatusCode::UNAUTHORIZED,
            reason: reason.into(),
        }
    }
}

/// Routes verified activities to their per-type handlers.
pub struct Dispatcher {
    ctx: HandlerContext,
    ledger: IdempotencyLedger,
    handlers: HashMap<&'static str, Box<dyn ActivityHandler>>,
    signature_max_age_secs: i64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ctx: HandlerContext, ledger: IdempotencyLedger, signature_max_age_secs: i64) -> Self {
        let handlers = all_handlers()
            .into_iter()
            .map(|h| (h.activity_type(), h))
            .collect();

        Self {
            ctx,
            ledger,
            handlers,
            signature_max_age_secs,
        }
    }

    /// Run one request through the full verification and dispatch chain.
    pub async fn dispatch(&self, request: &InboxRequest) -> AppResult<InboxOutcome> {
        // 1. Signature header must parse.
        let Some(raw_signature) = request.headers.get("signature") else {
            return Ok(InboxOutcome::bad_request("missing signature header"));
        };
        let components = match parse_signature_header(raw_signature) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Unparseable signature header");
                return Ok(InboxOutcome::bad_request("invalid signature header"));
            }
        };

        // 2. The signing actor's key must resolve.
        let actor_uri = actor_uri_from_key_id(&components.key_id);
        let signer = match self.ctx.resolver.resolve_actor(actor_uri, false).await? {
            Some(actor) => actor,
            None => {
                warn!(key_id = %components.key_id, "Signing actor could not be resolved");
                return Ok(InboxOutcome::unauthorized("signing actor not found"));
            }
        };
        let Some(public_key) = signer.public_key.as_deref() else {
            warn!(key_id = %components.key_id, "Signing actor has no public key");
            return Ok(InboxOutcome::unauthorized("signing actor has no public key"));
        };

        // 3. Signature, digest, and date must all verify.
        let signing_string = match build_signature_string(
            &request.method,
            &request.path,
            &request.headers,
            &components.headers,
        ) {
            Ok(s) => s,
            Err(e) => {
                return Ok(InboxOutcome::unauthorized(format!(
                    "cannot reconstruct signing string: {e}"
                )));
            }
        };
        if !verify_signature(
            public_key,
            &signing_string,
            &components.signature,
            &components.algorithm,
        ) {
            warn!(key_id = %components.key_id, host = ?request.headers.get("host"), "Signature verification failed");
            return Ok(InboxOutcome::unauthorized("signature verification failed"));
        }

        if let Some(digest) = request.headers.get("digest") {
            if !verify_digest(&request.body, digest) {
                warn!(key_id = %components.key_id, "Digest does not match body");
                return Ok(InboxOutcome::unauthorized("digest mismatch"));
            }
        }

        match request.headers.get("date") {
            Some(date) if verify_date_header(date, self.signature_max_age_secs) => {}
            _ => {
                warn!(key_id = %components.key_id, "Date header missing or stale");
                return Ok(InboxOutcome::unauthorized("date header missing or stale"));
            }
        }

        // 4. Body must be valid JSON of the expected shape.
        let activity: Activity = match serde_json::from_slice(&request.body) {
            Ok(a) => a,
            Err(e) => {
                debug!(error = %e, "Malformed activity JSON");
                return Ok(InboxOutcome::bad_request("malformed activity JSON"));
            }
        };

        // 5. Structural validation, accumulating every violation.
        let errors = validate_activity(&activity, Some(&components.key_id));
        if !errors.is_empty() {
            return Ok(InboxOutcome::bad_request(format_errors(&errors)));
        }

        // 6. Duplicate delivery short-circuits without touching a handler.
        if self.ledger.is_duplicate(&activity).await {
            return Ok(InboxOutcome::Ignored("duplicate activity".to_string()));
        }

        // 7. Unknown types stay forward-compatible: ignored, not rejected.
        let Some(handler) = self.handlers.get(activity.kind.as_str()) else {
            debug!(activity_type = %activity.kind, "Unsupported activity type");
            self.ledger.record(&activity).await;
            return Ok(InboxOutcome::Ignored(format!(
                "unsupported activity type {}",
                activity.kind
            )));
        };

        let result = handler.handle(&activity, &self.ctx).await?;
        info!(
            activity_type = %activity.kind,
            actor = activity.actor_uri().as_deref().unwrap_or("unknown"),
            success = result.success,
            message = %result.message,
            "Activity dispatched"
        );

        if result.success {
            // Recorded only on success: a semantically failed activity
            // (a Like that raced ahead of its note's Create) must stay
            // retryable under the same id.
            self.ledger.record(&activity).await;
            Ok(InboxOutcome::Accepted(result.message))
        } else {
            Ok(InboxOutcome::Failed(result.message))
        }
    }
}
