//! Inbound Reject: a remote actor declined a request we sent.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use async_trait::async_trait;
use tracing::info;

pub struct RejectHandler;

#[async_trait]
impl ActivityHandler for RejectHandler {
    fn activity_type(&self) -> &'static str {
        "Reject"
    }

    async fn handle(&self, activity: &Activity, _ctx: &HandlerContext) -> AppResult<HandlerResult> {
        // TODO: tear down the pending outbound follow this Reject refers
        // to once pending state is tracked separately from active rows.
        info!(
            actor = activity.actor_uri().as_deref().unwrap_or("unknown"),
            inner_type = activity
                .object
                .as_ref()
                .and_then(|o| o.object_type())
                .unwrap_or("unknown"),
            "Reject received"
        );
        Ok(HandlerResult::ok("reject noted"))
    }
}
