//! Executor for replying to a comment.

use async_trait::async_trait;

use super::resolve_credentials;
use crate::kernel::deps::DeliveryDeps;
use crate::kernel::outbound::action::{CommentReplyPayload, OutboundAction};
use crate::kernel::outbound::error::DeliveryError;
use crate::kernel::outbound::registry::ActionExecutor;

pub struct CommentReplyExecutor;

#[async_trait]
impl ActionExecutor for CommentReplyExecutor {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        let payload: CommentReplyPayload = action.payload_as()?;
        let credentials = resolve_credentials(deps, action.account_id).await?;

        let reply_id = deps
            .platform
            .reply_to_comment(&credentials, &payload.comment_id, &payload.text)
            .await?;

        Ok(reply_id)
    }
}
