//! Executor for publishing a post (two-step: container, then publish).

use async_trait::async_trait;
use tracing::warn;

use super::{publish_with_resumption, resolve_credentials};
use crate::kernel::deps::DeliveryDeps;
use crate::kernel::outbound::action::{OutboundAction, PublishPostPayload};
use crate::kernel::outbound::error::DeliveryError;
use crate::kernel::outbound::registry::ActionExecutor;

pub struct PublishPostExecutor;

#[async_trait]
impl ActionExecutor for PublishPostExecutor {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        let payload: PublishPostPayload = action.payload_as()?;
        let credentials = resolve_credentials(deps, action.account_id).await?;

        let media_id = publish_with_resumption(
            action,
            deps,
            &credentials,
            &payload.media_url,
            &payload.caption,
            payload.media_type,
            payload.creation_id,
        )
        .await?;

        // Secondary source-of-truth update: best-effort, never gates success.
        if let Some(post_id) = payload.scheduled_post_id {
            if let Err(e) = deps.catalog.mark_post_published(post_id, &media_id).await {
                warn!(
                    action_id = %action.id,
                    scheduled_post_id = %post_id,
                    error = %e,
                    "failed to mark scheduled post published"
                );
            }
        }

        Ok(media_id)
    }
}
