//! Inbound Move: account migration between remote actors.
//!
//! Validation is all-or-nothing: both actors are force-refreshed and
//! must list each other in `alsoKnownAs` before any row is written.
//! Execution is partial-failure-tolerant: each local follower migrates
//! independently, and one failed delivery never aborts the batch.

use super::{ActivityHandler, HandlerContext, HandlerResult};
use crate::activity::Activity;
use crate::delivery::local_actor_uri;
use akari_common::AppResult;
use akari_store::entities::Follow;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

pub struct MoveHandler;

#[async_trait]
impl ActivityHandler for MoveHandler {
    fn activity_type(&self) -> &'static str {
        "Move"
    }

    async fn handle(&self, activity: &Activity, ctx: &HandlerContext) -> AppResult<HandlerResult> {
        let Some(old_uri) = activity.actor_uri() else {
            return Ok(HandlerResult::fail("missing actor"));
        };
        let new_uri = match activity
            .target
            .as_ref()
            .and_then(crate::activity::ObjectRef::uri)
            .or_else(|| activity.object_uri().filter(|uri| *uri != old_uri))
        {
            Some(uri) => uri,
            None => return Ok(HandlerResult::fail("move has no target account")),
        };

        // Fresh documents only: a cached alsoKnownAs could predate the
        // migration being set up (or torn down).
        let Some(old_actor) = ctx.resolver.resolve_actor(&old_uri, true).await? else {
            return Ok(HandlerResult::fail("moving actor could not be resolved"));
        };
        let Some(new_actor) = ctx.resolver.resolve_actor(&new_uri, true).await? else {
            return Ok(HandlerResult::fail("move target could not be resolved"));
        };

        let old_claims_new = old_actor.also_known_as.iter().any(|aka| *aka == new_uri);
        let new_claims_old = new_actor.also_known_as.iter().any(|aka| *aka == old_uri);
        if !old_claims_new || !new_claims_old {
            warn!(
                old = %old_uri,
                new = %new_uri,
                old_claims_new,
                new_claims_old,
                "Move rejected, alsoKnownAs is not bidirectional"
            );
            return Ok(HandlerResult::fail(
                "alsoKnownAs must reference both accounts",
            ));
        }

        let Some(new_inbox) = new_actor.delivery_inbox().map(ToString::to_string) else {
            return Ok(HandlerResult::fail("move target has no inbox"));
        };

        let mut migrated_count = 0usize;
        let mut error_count = 0usize;

        for follow in ctx.follows.find_followers(&old_actor.id).await? {
            let Some(follower) = ctx.users.find_by_id(&follow.follower_id).await? else {
                continue;
            };
            // Remote followers are migrated by their own instance.
            if !follower.is_local() {
                continue;
            }

            if ctx.follows.is_following(&follower.id, &new_actor.id).await? {
                migrated_count += 1;
                continue;
            }

            ctx.follows
                .create(Follow {
                    id: ctx.id_gen.generate(),
                    follower_id: follower.id.clone(),
                    followee_id: new_actor.id.clone(),
                    created_at: Utc::now(),
                })
                .await?;

            let follower = ctx.ensure_keypair(follower).await?;
            let follower_uri = local_actor_uri(&follower, &ctx.base_url);
            let follow_activity = ctx.delivery.build_follow(&follower_uri, &new_uri);
            match ctx
                .delivery
                .deliver_as(&follower, &follow_activity, &new_inbox)
                .await
            {
                Ok(()) => migrated_count += 1,
                Err(e) => {
                    warn!(
                        follower = %follower.username,
                        error = %e,
                        "Follow delivery to move target failed"
                    );
                    error_count += 1;
                }
            }
        }

        let mut old_actor = old_actor;
        old_actor.moved_to = Some(new_uri.clone());
        old_actor.moved_at = Some(Utc::now());
        ctx.users.update(old_actor).await?;

        info!(
            old = %old_uri,
            new = %new_uri,
            migrated_count,
            error_count,
            "Move processed"
        );
        Ok(HandlerResult::ok(format!(
            "moved {migrated_count} followers ({error_count} errors)"
        )))
    }
}
