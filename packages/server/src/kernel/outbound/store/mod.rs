//! Durable storage for outbound actions.
//!
//! The status transition is the mutual-exclusion mechanism: `mark_processing`
//! is a conditional update and at most one caller wins it for a given row.
//! All update operations are idempotent under retried invocation of
//! themselves.

mod memory;
mod postgres;

pub use memory::MemoryActionStore;
pub use postgres::PgActionStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::action::OutboundAction;
use super::classify::ErrorCategory;

#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Enqueue a new action (used by upstream business logic).
    async fn insert(&self, action: OutboundAction) -> Result<OutboundAction>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundAction>>;

    /// Up to `limit` actions with status pending/failed whose
    /// `next_attempt_at` is null or past, oldest first.
    async fn select_eligible(&self, limit: i64) -> Result<Vec<OutboundAction>>;

    /// Atomically transition pending/failed -> processing. Returns whether
    /// this caller won the transition.
    async fn mark_processing(&self, id: Uuid) -> Result<bool>;

    /// Terminal success. Safe to repeat with the same `external_id`.
    async fn mark_sent(&self, id: Uuid, external_id: &str) -> Result<()>;

    /// Failed attempt with retries remaining; `next_attempt_at` gates the
    /// next pickup.
    async fn mark_failed(
        &self,
        id: Uuid,
        retry_count: i32,
        error: &str,
        category: ErrorCategory,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Terminal failure: retries exhausted or a non-retryable error.
    async fn mark_dead(
        &self,
        id: Uuid,
        retry_count: i32,
        error: &str,
        category: ErrorCategory,
    ) -> Result<()>;

    /// Shallow-merge `patch` into the payload. Executors call this to persist
    /// resumption state before the next external call.
    async fn mutate_payload(&self, id: Uuid, patch: serde_json::Value) -> Result<()>;

    /// Operator recovery: reset a failed/dead action to pending. The retry
    /// count is preserved for visibility. Returns whether a row changed.
    async fn retry(&self, id: Uuid) -> Result<bool>;

    /// Rows stuck at `processing` longer than `older_than`, the footprint of
    /// a crash mid-execution. Surfaced as an operational alarm; there is no
    /// automatic reclaim.
    async fn count_stuck_processing(&self, older_than: Duration) -> Result<i64>;
}
