//! Executors for Send API messages.
//!
//! A thread reply and a fresh direct message are the same call on the wire;
//! they stay separate kinds because upstream enqueues them from different
//! flows and operators want to tell them apart in the queue.

use async_trait::async_trait;

use super::resolve_credentials;
use crate::kernel::deps::DeliveryDeps;
use crate::kernel::outbound::action::{MessagePayload, OutboundAction};
use crate::kernel::outbound::error::DeliveryError;
use crate::kernel::outbound::registry::ActionExecutor;

async fn send(action: &OutboundAction, deps: &DeliveryDeps) -> Result<String, DeliveryError> {
    let payload: MessagePayload = action.payload_as()?;
    let credentials = resolve_credentials(deps, action.account_id).await?;

    let message_id = deps
        .platform
        .send_message(&credentials, &payload.recipient_id, &payload.text)
        .await?;

    Ok(message_id)
}

pub struct MessageReplyExecutor;

#[async_trait]
impl ActionExecutor for MessageReplyExecutor {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        send(action, deps).await
    }
}

pub struct DirectMessageExecutor;

#[async_trait]
impl ActionExecutor for DirectMessageExecutor {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        send(action, deps).await
    }
}
