//! Executor registry for dispatching outbound actions.
//!
//! Maps each [`ActionKind`] to the executor that performs its external call.
//! The scanner claims actions from the store and dispatches them through this
//! registry without knowing the concrete executor types; new kinds are added
//! here without touching the scanner.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::action::{ActionKind, OutboundAction};
use super::error::DeliveryError;
use super::executors;
use crate::kernel::deps::DeliveryDeps;

/// One executor per action kind. `execute` performs (or resumes) the
/// external call and returns the platform-assigned id.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError>;
}

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<ActionKind, Arc<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: ActionKind, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// Execute an action through its registered executor.
    ///
    /// An unregistered kind is a payload-level defect (non-retryable), not a
    /// transient condition.
    pub async fn dispatch(
        &self,
        action: &OutboundAction,
        deps: &DeliveryDeps,
    ) -> Result<String, DeliveryError> {
        let executor = self.executors.get(&action.kind).ok_or_else(|| {
            DeliveryError::Payload(format!("no executor registered for {}", action.kind.as_str()))
        })?;

        executor.execute(action, deps).await
    }

    pub fn is_registered(&self, kind: ActionKind) -> bool {
        self.executors.contains_key(&kind)
    }
}

/// Registry wired with every production executor.
pub fn default_registry() -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    registry.register(
        ActionKind::CommentReply,
        Arc::new(executors::CommentReplyExecutor),
    );
    registry.register(
        ActionKind::MessageReply,
        Arc::new(executors::MessageReplyExecutor),
    );
    registry.register(
        ActionKind::DirectMessage,
        Arc::new(executors::DirectMessageExecutor),
    );
    registry.register(
        ActionKind::PublishPost,
        Arc::new(executors::PublishPostExecutor),
    );
    registry.register(ActionKind::Repost, Arc::new(executors::RepostExecutor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_every_kind() {
        let registry = default_registry();
        for kind in [
            ActionKind::CommentReply,
            ActionKind::MessageReply,
            ActionKind::DirectMessage,
            ActionKind::PublishPost,
            ActionKind::Repost,
        ] {
            assert!(registry.is_registered(kind), "{} missing", kind.as_str());
        }
    }

    #[tokio::test]
    async fn dispatching_an_unregistered_kind_is_a_payload_error() {
        let registry = ExecutorRegistry::new();
        let deps = crate::kernel::outbound::testing::test_deps();
        let action = OutboundAction::new(
            uuid::Uuid::new_v4(),
            ActionKind::CommentReply,
            serde_json::json!({}),
        );

        let result = registry.dispatch(&action, &deps).await;
        assert!(matches!(result, Err(DeliveryError::Payload(_))));
    }
}
