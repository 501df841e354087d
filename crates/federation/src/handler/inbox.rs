//! Inbox endpoints: the inbound HTTP federation surface.

use crate::dispatcher::{Dispatcher, InboxRequest};
use akari_common::AppResult;
use axum::{
    Json,
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared state for the inbox routes.
#[derive(Clone)]
pub struct InboxState {
    pub dispatcher: Arc<Dispatcher>,
}

/// `POST /inbox`: the shared inbox.
pub async fn inbox_handler(
    State(state): State<InboxState>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    dispatch(&state, &method, &uri, &headers, &body).await
}

/// `POST /users/{username}/inbox`: a personal inbox. Addressing is
/// carried inside the activity itself, so the path only matters for the
/// signed `(request-target)`.
pub async fn user_inbox_handler(
    State(state): State<InboxState>,
    Path(username): Path<String>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    debug!(username = %username, "Personal inbox delivery");
    dispatch(&state, &method, &uri, &headers, &body).await
}

async fn dispatch(
    state: &InboxState,
    method: &Method,
    uri: &axum::http::Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> AppResult<Response> {
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);

    let request = InboxRequest {
        method: method.as_str().to_string(),
        path,
        headers: header_map(headers),
        body: body.to_vec(),
    };

    let outcome = state.dispatcher.dispatch(&request).await?;
    let status = outcome.status();
    let body = Json(json!({ "message": outcome.message() }));

    Ok((status, body).into_response())
}

/// Flatten headers into the lowercased map the signature layer expects.
/// Non-UTF8 values cannot appear in a valid signing string, so they are
/// dropped.
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}
