//! Per-kind action executors.
//!
//! Single-step kinds make one platform call. Multi-step kinds (publishing)
//! write their container id back into the action payload *before* the publish
//! call, so a retry after a partial failure resumes instead of creating a
//! second container.

mod comment_reply;
mod messaging;
mod publish_post;
mod repost;

pub use comment_reply::CommentReplyExecutor;
pub use messaging::{DirectMessageExecutor, MessageReplyExecutor};
pub use publish_post::PublishPostExecutor;
pub use repost::RepostExecutor;

use serde_json::json;
use uuid::Uuid;

use crate::kernel::deps::DeliveryDeps;
use crate::kernel::outbound::action::{MediaType, OutboundAction};
use crate::kernel::outbound::error::DeliveryError;
use crate::kernel::traits::AccountCredentials;

/// Resolve credentials for the action's account; failure is an auth error.
pub(super) async fn resolve_credentials(
    deps: &DeliveryDeps,
    account_id: Uuid,
) -> Result<AccountCredentials, DeliveryError> {
    deps.credentials
        .resolve(account_id)
        .await
        .map_err(|e| DeliveryError::Credentials {
            account_id,
            message: e.to_string(),
        })
}

/// Shared two-step publish flow with resumption.
///
/// Creates a media container unless `creation_id` already carries one from a
/// previous attempt, persists the new container id into the payload, then
/// publishes. The persist happens before the publish call: a crash between
/// the two steps must not lead to a second container on retry.
pub(super) async fn publish_with_resumption(
    action: &OutboundAction,
    deps: &DeliveryDeps,
    credentials: &AccountCredentials,
    media_url: &str,
    caption: &str,
    media_type: MediaType,
    creation_id: Option<String>,
) -> Result<String, DeliveryError> {
    let creation_id = match creation_id {
        Some(id) => id,
        None => {
            let id = deps
                .platform
                .create_media_container(credentials, media_url, caption, media_type)
                .await?;

            deps.store
                .mutate_payload(action.id, json!({ "creation_id": id }))
                .await
                .map_err(DeliveryError::Internal)?;

            tracing::debug!(
                action_id = %action.id,
                creation_id = %id,
                "media container created, resumption state persisted"
            );
            id
        }
    };

    let media_id = deps
        .platform
        .publish_media_container(credentials, &creation_id)
        .await?;

    Ok(media_id)
}
