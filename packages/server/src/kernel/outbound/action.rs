//! Outbound action model.
//!
//! One row per queued platform action. The `payload` column is JSONB and
//! doubles as resumption state: multi-step executors write intermediate
//! references (e.g. a media container id) back into it mid-flight so a retry
//! can skip sub-steps that already happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::classify::ErrorCategory;
use super::error::DeliveryError;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "action_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Processing,
    Sent,
    Failed,
    Dead,
}

impl ActionStatus {
    /// Terminal statuses never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Sent | ActionStatus::Dead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "action_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CommentReply,
    MessageReply,
    DirectMessage,
    PublishPost,
    Repost,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CommentReply => "comment_reply",
            ActionKind::MessageReply => "message_reply",
            ActionKind::DirectMessage => "direct_message",
            ActionKind::PublishPost => "publish_post",
            ActionKind::Repost => "repost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Video,
    Reel,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Reel => "reel",
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReplyPayload {
    pub comment_id: String,
    pub text: String,
}

/// Shared by `message_reply` and `direct_message`: the Send API treats a
/// thread reply and a fresh message the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub recipient_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPostPayload {
    pub media_url: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub media_type: MediaType,
    /// Resumption state: the media container id from step 1. Present iff a
    /// previous attempt already created the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_id: Option<String>,
    /// When set, the scheduled post row is marked published on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepostPayload {
    /// The grant row to re-resolve at execution time. Media URL and caption
    /// are intentionally not snapshotted here.
    pub permission_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_id: Option<String>,
}

// ============================================================================
// Action Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct OutboundAction {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,

    /// The connected platform account this action goes out through; also the
    /// unit of rate-limit grouping.
    pub account_id: Uuid,
    pub kind: ActionKind,

    #[builder(default = serde_json::json!({}))]
    pub payload: serde_json::Value,

    #[builder(default)]
    pub status: ActionStatus,
    #[builder(default = 0)]
    pub retry_count: i32,

    // Diagnostics, set on failure
    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_category: Option<ErrorCategory>,

    /// Gates eligibility while status is `failed`; null or past means ready.
    #[builder(default, setter(strip_option))]
    pub next_attempt_at: Option<DateTime<Utc>>,

    /// Platform-assigned id, set on success.
    #[builder(default, setter(strip_option))]
    pub external_id: Option<String>,

    #[builder(default, setter(strip_option))]
    pub dead_lettered_at: Option<DateTime<Utc>>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl OutboundAction {
    /// Create a pending action with an untyped payload.
    pub fn new(account_id: Uuid, kind: ActionKind, payload: serde_json::Value) -> Self {
        Self::builder()
            .account_id(account_id)
            .kind(kind)
            .payload(payload)
            .build()
    }

    pub fn comment_reply(account_id: Uuid, payload: &CommentReplyPayload) -> Self {
        Self::new(account_id, ActionKind::CommentReply, to_json(payload))
    }

    pub fn message_reply(account_id: Uuid, payload: &MessagePayload) -> Self {
        Self::new(account_id, ActionKind::MessageReply, to_json(payload))
    }

    pub fn direct_message(account_id: Uuid, payload: &MessagePayload) -> Self {
        Self::new(account_id, ActionKind::DirectMessage, to_json(payload))
    }

    pub fn publish_post(account_id: Uuid, payload: &PublishPostPayload) -> Self {
        Self::new(account_id, ActionKind::PublishPost, to_json(payload))
    }

    pub fn repost(account_id: Uuid, payload: &RepostPayload) -> Self {
        Self::new(account_id, ActionKind::Repost, to_json(payload))
    }

    /// Deserialize the payload into its kind-specific shape.
    ///
    /// A shape mismatch is an upstream defect, so it surfaces as a
    /// non-retryable payload error rather than an internal one.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, DeliveryError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DeliveryError::Payload(format!("{} payload: {}", self.kind.as_str(), e))
        })
    }

    /// Whether the scanner may pick this action up at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if !matches!(self.status, ActionStatus::Pending | ActionStatus::Failed) {
            return false;
        }

        match self.next_attempt_at {
            None => true,
            Some(at) => at <= now,
        }
    }
}

fn to_json<T: Serialize>(payload: &T) -> serde_json::Value {
    // Payload structs serialize infallibly (plain fields, no maps with
    // non-string keys).
    serde_json::to_value(payload).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_action() -> OutboundAction {
        OutboundAction::comment_reply(
            Uuid::new_v4(),
            &CommentReplyPayload {
                comment_id: "17891234".to_string(),
                text: "thanks!".to_string(),
            },
        )
    }

    #[test]
    fn new_action_starts_pending_with_zero_retries() {
        let action = sample_action();
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.retry_count, 0);
        assert!(action.external_id.is_none());
    }

    #[test]
    fn payload_round_trips_through_json() {
        let action = sample_action();
        let payload: CommentReplyPayload = action.payload_as().unwrap();
        assert_eq!(payload.comment_id, "17891234");
        assert_eq!(payload.text, "thanks!");
    }

    #[test]
    fn payload_shape_mismatch_is_a_payload_error() {
        let action = sample_action();
        let result: Result<RepostPayload, _> = action.payload_as();
        assert!(matches!(result, Err(DeliveryError::Payload(_))));
    }

    #[test]
    fn publish_payload_omits_absent_resumption_state() {
        let payload = PublishPostPayload {
            media_url: "https://cdn.example.com/a.jpg".to_string(),
            caption: "caption".to_string(),
            media_type: MediaType::Image,
            creation_id: None,
            scheduled_post_id: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("creation_id").is_none());
    }

    #[test]
    fn pending_action_is_eligible_now() {
        let action = sample_action();
        assert!(action.is_eligible(Utc::now()));
    }

    #[test]
    fn failed_action_waits_for_next_attempt_at() {
        let mut action = sample_action();
        action.status = ActionStatus::Failed;
        action.next_attempt_at = Some(Utc::now() + chrono::Duration::minutes(2));
        assert!(!action.is_eligible(Utc::now()));

        action.next_attempt_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(action.is_eligible(Utc::now()));
    }

    #[test]
    fn terminal_statuses_are_never_eligible() {
        let mut action = sample_action();
        for status in [ActionStatus::Processing, ActionStatus::Sent, ActionStatus::Dead] {
            action.status = status;
            assert!(!action.is_eligible(Utc::now()));
        }
        assert!(ActionStatus::Sent.is_terminal());
        assert!(ActionStatus::Dead.is_terminal());
        assert!(!ActionStatus::Processing.is_terminal());
    }
}
