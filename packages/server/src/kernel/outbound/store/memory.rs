//! In-memory action store for testing and development.
//!
//! Mirrors the Postgres store's transition semantics, including the
//! single-winner `mark_processing` guarantee (the whole map sits behind one
//! write lock, so the check-and-set is atomic).

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::ActionStore;
use crate::kernel::outbound::action::{ActionStatus, OutboundAction};
use crate::kernel::outbound::classify::ErrorCategory;

/// Not suitable for production: data is lost on restart.
#[derive(Default)]
pub struct MemoryActionStore {
    actions: RwLock<HashMap<Uuid, OutboundAction>>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().unwrap().is_empty()
    }

    /// Direct snapshot accessor for test assertions.
    pub fn get(&self, id: Uuid) -> Option<OutboundAction> {
        self.actions.read().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl ActionStore for MemoryActionStore {
    async fn insert(&self, action: OutboundAction) -> Result<OutboundAction> {
        self.actions
            .write()
            .unwrap()
            .insert(action.id, action.clone());
        Ok(action)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundAction>> {
        Ok(self.get(id))
    }

    async fn select_eligible(&self, limit: i64) -> Result<Vec<OutboundAction>> {
        let now = Utc::now();
        let mut eligible: Vec<OutboundAction> = self
            .actions
            .read()
            .unwrap()
            .values()
            .filter(|a| a.is_eligible(now))
            .cloned()
            .collect();

        eligible.sort_by_key(|a| a.created_at);
        eligible.truncate(limit.max(0) as usize);
        Ok(eligible)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let mut actions = self.actions.write().unwrap();
        match actions.get_mut(&id) {
            Some(action)
                if matches!(action.status, ActionStatus::Pending | ActionStatus::Failed) =>
            {
                action.status = ActionStatus::Processing;
                action.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_sent(&self, id: Uuid, external_id: &str) -> Result<()> {
        let mut actions = self.actions.write().unwrap();
        if let Some(action) = actions.get_mut(&id) {
            if matches!(action.status, ActionStatus::Processing | ActionStatus::Sent) {
                action.status = ActionStatus::Sent;
                action.external_id = Some(external_id.to_string());
                action.last_error = None;
                action.error_category = None;
                action.next_attempt_at = None;
                action.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        retry_count: i32,
        error: &str,
        category: ErrorCategory,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut actions = self.actions.write().unwrap();
        if let Some(action) = actions.get_mut(&id) {
            if !action.status.is_terminal() {
                action.status = ActionStatus::Failed;
                action.retry_count = retry_count;
                action.last_error = Some(error.to_string());
                action.error_category = Some(category);
                action.next_attempt_at = Some(next_attempt_at);
                action.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_dead(
        &self,
        id: Uuid,
        retry_count: i32,
        error: &str,
        category: ErrorCategory,
    ) -> Result<()> {
        let mut actions = self.actions.write().unwrap();
        if let Some(action) = actions.get_mut(&id) {
            if action.status != ActionStatus::Sent {
                action.status = ActionStatus::Dead;
                action.retry_count = retry_count;
                action.last_error = Some(error.to_string());
                action.error_category = Some(category);
                action.next_attempt_at = None;
                action.dead_lettered_at = Some(Utc::now());
                action.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mutate_payload(&self, id: Uuid, patch: serde_json::Value) -> Result<()> {
        let mut actions = self.actions.write().unwrap();
        if let Some(action) = actions.get_mut(&id) {
            merge_shallow(&mut action.payload, patch);
            action.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<bool> {
        let mut actions = self.actions.write().unwrap();
        match actions.get_mut(&id) {
            Some(action)
                if matches!(action.status, ActionStatus::Failed | ActionStatus::Dead) =>
            {
                action.status = ActionStatus::Pending;
                action.next_attempt_at = None;
                action.dead_lettered_at = None;
                action.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_stuck_processing(&self, older_than: Duration) -> Result<i64> {
        let threshold = Utc::now() - older_than;
        let count = self
            .actions
            .read()
            .unwrap()
            .values()
            .filter(|a| a.status == ActionStatus::Processing && a.updated_at < threshold)
            .count();
        Ok(count as i64)
    }
}

/// Same semantics as Postgres `payload || patch`: top-level keys replace.
fn merge_shallow(payload: &mut serde_json::Value, patch: serde_json::Value) {
    match (payload.as_object_mut(), patch) {
        (Some(target), serde_json::Value::Object(source)) => {
            for (key, value) in source {
                target.insert(key, value);
            }
        }
        (_, patch) => *payload = patch,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kernel::outbound::action::{ActionKind, MessagePayload};
    use serde_json::json;

    fn message_action() -> OutboundAction {
        OutboundAction::direct_message(
            Uuid::new_v4(),
            &MessagePayload {
                recipient_id: "r1".to_string(),
                text: "hi".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn select_eligible_orders_oldest_first_and_respects_limit() {
        let store = MemoryActionStore::new();
        let mut first = message_action();
        first.created_at = Utc::now() - chrono::Duration::minutes(10);
        let mut second = message_action();
        second.created_at = Utc::now() - chrono::Duration::minutes(5);

        store.insert(second.clone()).await.unwrap();
        store.insert(first.clone()).await.unwrap();

        let eligible = store.select_eligible(10).await.unwrap();
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].id, first.id);

        let limited = store.select_eligible(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, first.id);
    }

    #[tokio::test]
    async fn select_eligible_skips_backoff_window() {
        let store = MemoryActionStore::new();
        let mut action = message_action();
        action.status = ActionStatus::Failed;
        action.next_attempt_at = Some(Utc::now() + chrono::Duration::minutes(2));
        store.insert(action).await.unwrap();

        assert!(store.select_eligible(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_mark_processing_has_exactly_one_winner() {
        let store = Arc::new(MemoryActionStore::new());
        let action = message_action();
        let id = action.id;
        store.insert(action).await.unwrap();

        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                async move { store.mark_processing(id).await.unwrap() }
            },
            {
                let store = store.clone();
                async move { store.mark_processing(id).await.unwrap() }
            }
        );

        assert!(a ^ b, "exactly one caller must win the transition");
        assert_eq!(store.get(id).unwrap().status, ActionStatus::Processing);
    }

    #[tokio::test]
    async fn mark_sent_is_idempotent() {
        let store = MemoryActionStore::new();
        let action = message_action();
        let id = action.id;
        store.insert(action).await.unwrap();

        assert!(store.mark_processing(id).await.unwrap());
        store.mark_sent(id, "mid.42").await.unwrap();
        store.mark_sent(id, "mid.42").await.unwrap();

        let sent = store.get(id).unwrap();
        assert_eq!(sent.status, ActionStatus::Sent);
        assert_eq!(sent.external_id.as_deref(), Some("mid.42"));
    }

    #[tokio::test]
    async fn sent_actions_never_leave_sent() {
        let store = MemoryActionStore::new();
        let action = message_action();
        let id = action.id;
        store.insert(action).await.unwrap();

        store.mark_processing(id).await.unwrap();
        store.mark_sent(id, "mid.42").await.unwrap();

        store
            .mark_dead(id, 1, "late failure", ErrorCategory::Unknown)
            .await
            .unwrap();
        assert_eq!(store.get(id).unwrap().status, ActionStatus::Sent);

        assert!(!store.mark_processing(id).await.unwrap());
        assert!(store.select_eligible(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mutate_payload_merges_top_level_keys() {
        let store = MemoryActionStore::new();
        let mut action = message_action();
        action.kind = ActionKind::PublishPost;
        action.payload = json!({ "media_url": "https://cdn.example.com/a.jpg" });
        let id = action.id;
        store.insert(action).await.unwrap();

        store
            .mutate_payload(id, json!({ "creation_id": "c-1" }))
            .await
            .unwrap();

        let payload = store.get(id).unwrap().payload;
        assert_eq!(payload["media_url"], "https://cdn.example.com/a.jpg");
        assert_eq!(payload["creation_id"], "c-1");
    }

    #[tokio::test]
    async fn operator_retry_restores_eligibility_and_keeps_retry_count() {
        let store = MemoryActionStore::new();
        let action = message_action();
        let id = action.id;
        store.insert(action).await.unwrap();

        store.mark_processing(id).await.unwrap();
        store
            .mark_dead(id, 5, "exhausted", ErrorCategory::Transient)
            .await
            .unwrap();
        assert!(store.select_eligible(10).await.unwrap().is_empty());

        assert!(store.retry(id).await.unwrap());
        let restored = store.get(id).unwrap();
        assert_eq!(restored.status, ActionStatus::Pending);
        assert_eq!(restored.retry_count, 5);
        assert_eq!(store.select_eligible(10).await.unwrap().len(), 1);

        // Retrying a pending action is a no-op.
        assert!(!store.retry(id).await.unwrap());
    }

    #[tokio::test]
    async fn stuck_processing_rows_are_counted() {
        let store = MemoryActionStore::new();
        let mut action = message_action();
        action.status = ActionStatus::Processing;
        action.updated_at = Utc::now() - chrono::Duration::hours(2);
        store.insert(action).await.unwrap();

        assert_eq!(
            store
                .count_stuck_processing(chrono::Duration::minutes(30))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count_stuck_processing(chrono::Duration::hours(3))
                .await
                .unwrap(),
            0
        );
    }
}
