//! Inbound Accept: a remote actor confirmed something we sent.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use akari_common::AppResult;
use async_trait::async_trait;
use tracing::{debug, info};

pub struct AcceptHandler;

#[async_trait]
impl ActivityHandler for AcceptHandler {
    fn activity_type(&self) -> &'static str {
        "Accept"
    }

    async fn handle(&self, activity: &Activity, _ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let inner_type = activity
            .object
            .as_ref()
            .and_then(|o| o.object_type())
            .unwrap_or("unknown");

        match inner_type {
            // Outbound follows are recorded eagerly at send time, so the
            // remote Accept only confirms what we already have.
            "Follow" => {
                info!(
                    actor = activity.actor_uri().as_deref().unwrap_or("unknown"),
                    "Follow confirmed by remote"
                );
                Ok(HandlerResult::ok("follow confirmed"))
            }
            other => {
                debug!(inner_type = other, "Accept for unsupported inner type");
                Ok(HandlerResult::ok(format!(
                    "accept for {other} noted but not processed"
                )))
            }
        }
    }
}
