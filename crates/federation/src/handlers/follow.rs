//! Inbound Follow: a remote actor wants to follow a local account.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use crate::delivery::local_actor_uri;
use akari_common::AppResult;
use akari_store::entities::Follow;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

pub struct FollowHandler;

#[async_trait]
impl ActivityHandler for FollowHandler {
    fn activity_type(&self) -> &'static str {
        "Follow"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(actor_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let Some(object_uri) = activity.object_uri() else {
            return Ok(HandlerResult::fail("missing follow target"));
        };

        if !ctx.is_local_uri(&object_uri) {
            return Ok(HandlerResult::fail("follow target is not on this instance"));
        }

        let Some(followee) = ctx.find_local_by_uri(&object_uri).await? else {
            return Ok(HandlerResult::fail("follow target not found"));
        };

        let Some(follower) = ctx.resolver.resolve_actor(&actor_uri, false).await? else {
            return Ok(HandlerResult::fail("follower could not be resolved"));
        };

        if follower.id == followee.id {
            return Ok(HandlerResult::fail("cannot follow self"));
        }
        if ctx.follows.is_following(&follower.id, &followee.id).await? {
            return Ok(HandlerResult::fail("already following"));
        }

        // Manually-approved accounts hold the request: no row is written
        // and no Accept goes out until the owner approves.
        if followee.is_locked {
            info!(
                follower = %actor_uri,
                followee = %followee.username,
                "Follow request held for manual approval"
            );
            return Ok(HandlerResult::ok("follow request pending"));
        }

        ctx.follows
            .create(Follow {
                id: ctx.id_gen.generate(),
                follower_id: follower.id.clone(),
                followee_id: followee.id.clone(),
                created_at: Utc::now(),
            })
            .await?;

        info!(follower = %actor_uri, followee = %followee.username, "Follow accepted");

        // Auto-Accept back to the follower's inbox. The relationship is
        // already recorded, so a failed Accept delivery is logged rather
        // than unwinding the follow.
        let follow_value = serde_json::to_value(activity)?;
        let followee = ctx.ensure_keypair(followee).await?;
        let local_uri = local_actor_uri(&followee, &ctx.base_url);
        let accept = ctx.delivery.build_accept(&local_uri, follow_value);

        if let Some(inbox) = follower.delivery_inbox() {
            if let Err(e) = ctx.delivery.deliver_as(&followee, &accept, inbox).await {
                warn!(follower = %actor_uri, error = %e, "Accept delivery failed");
            }
        } else {
            warn!(follower = %actor_uri, "Follower has no inbox for Accept delivery");
        }

        Ok(HandlerResult::ok("follow accepted"))
    }
}
