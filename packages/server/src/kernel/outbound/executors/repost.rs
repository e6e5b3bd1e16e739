//! Executor for reposting permitted third-party media.

use async_trait::async_trait;

use super::{publish_with_resumption, resolve_credentials};
use crate::kernel::deps::DeliveryDeps;
use crate::kernel::outbound::action::{OutboundAction, RepostPayload};
use crate::kernel::outbound::error::DeliveryError;
use crate::kernel::outbound::registry::ActionExecutor;
use crate::kernel::traits::RepostSource;

pub struct RepostExecutor;

#[async_trait]
impl ActionExecutor for RepostExecutor {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        let payload: RepostPayload = action.payload_as()?;

        // Execution may happen long after enqueue, so the grant is
        // re-resolved here instead of trusting a snapshot in the payload. A
        // revoked grant must stop the repost even if it was valid at enqueue.
        let source = deps
            .catalog
            .find_repost_source(payload.permission_id)
            .await
            .map_err(DeliveryError::Internal)?
            .ok_or_else(|| {
                DeliveryError::SourceUnavailable(format!(
                    "repost permission {} not found or revoked",
                    payload.permission_id
                ))
            })?;

        let credentials = resolve_credentials(deps, action.account_id).await?;
        let caption = attributed_caption(&source);

        let media_id = publish_with_resumption(
            action,
            deps,
            &credentials,
            &source.media_url,
            &caption,
            source.media_type,
            payload.creation_id,
        )
        .await?;

        Ok(media_id)
    }
}

fn attributed_caption(source: &RepostSource) -> String {
    match source.owner_username.as_deref() {
        Some(owner) if !owner.is_empty() => format!("{}\n\nvia @{}", source.caption, owner),
        _ => source.caption.clone(),
    }
}
