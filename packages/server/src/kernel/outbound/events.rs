//! Delivery lifecycle events.
//!
//! Facts about settled attempts, recorded through a best-effort telemetry
//! sink. Recording is never allowed to affect the outcome of the action
//! itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::ActionKind;
use super::classify::ErrorCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
    /// The action's side effect landed; `external_id` is the platform's id.
    Sent {
        action_id: Uuid,
        account_id: Uuid,
        kind: ActionKind,
        external_id: String,
    },

    /// An attempt failed and the action was scheduled for retry.
    Failed {
        action_id: Uuid,
        account_id: Uuid,
        kind: ActionKind,
        category: ErrorCategory,
        attempt: i32,
        will_retry: bool,
        error: String,
    },

    /// The action exhausted retries or hit a non-retryable failure.
    DeadLettered {
        action_id: Uuid,
        account_id: Uuid,
        kind: ActionKind,
        category: ErrorCategory,
        total_attempts: i32,
        error: String,
    },
}

/// Telemetry sink that forwards events to the log stream.
pub struct LogTelemetry;

#[async_trait::async_trait]
impl crate::kernel::traits::BaseTelemetrySink for LogTelemetry {
    async fn record(&self, event: DeliveryEvent) {
        match &event {
            DeliveryEvent::Sent {
                action_id,
                kind,
                external_id,
                ..
            } => {
                tracing::info!(
                    action_id = %action_id,
                    kind = kind.as_str(),
                    external_id = %external_id,
                    "outbound action sent"
                );
            }
            DeliveryEvent::Failed {
                action_id,
                kind,
                attempt,
                error,
                ..
            } => {
                tracing::warn!(
                    action_id = %action_id,
                    kind = kind.as_str(),
                    attempt = attempt,
                    error = %error,
                    "outbound action failed, will retry"
                );
            }
            DeliveryEvent::DeadLettered {
                action_id,
                kind,
                total_attempts,
                error,
                ..
            } => {
                tracing::error!(
                    action_id = %action_id,
                    kind = kind.as_str(),
                    total_attempts = total_attempts,
                    error = %error,
                    "outbound action dead-lettered"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_event_serializes() {
        let event = DeliveryEvent::Sent {
            action_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            kind: ActionKind::DirectMessage,
            external_id: "mid.123".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Sent"));
        assert!(json.contains("mid.123"));
    }

    #[test]
    fn dead_lettered_event_serializes_with_category() {
        let event = DeliveryEvent::DeadLettered {
            action_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            kind: ActionKind::PublishPost,
            category: ErrorCategory::Auth,
            total_attempts: 1,
            error: "token expired".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("DeadLettered"));
        assert!(json.contains("auth"));
    }
}
