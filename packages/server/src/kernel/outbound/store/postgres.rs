//! PostgreSQL-backed action store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::ActionStore;
use crate::kernel::outbound::action::OutboundAction;
use crate::kernel::outbound::classify::ErrorCategory;

const COLUMNS: &str = "id, account_id, kind, payload, status, retry_count, last_error, \
                       error_category, next_attempt_at, external_id, dead_lettered_at, \
                       created_at, updated_at";

pub struct PgActionStore {
    pool: PgPool,
}

impl PgActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionStore for PgActionStore {
    async fn insert(&self, action: OutboundAction) -> Result<OutboundAction> {
        let inserted = sqlx::query_as::<_, OutboundAction>(&format!(
            r#"
            INSERT INTO outbound_actions (
                id, account_id, kind, payload, status, retry_count, last_error,
                error_category, next_attempt_at, external_id, dead_lettered_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(action.id)
        .bind(action.account_id)
        .bind(action.kind)
        .bind(&action.payload)
        .bind(action.status)
        .bind(action.retry_count)
        .bind(&action.last_error)
        .bind(action.error_category)
        .bind(action.next_attempt_at)
        .bind(&action.external_id)
        .bind(action.dead_lettered_at)
        .bind(action.created_at)
        .bind(action.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboundAction>> {
        let action = sqlx::query_as::<_, OutboundAction>(&format!(
            "SELECT {COLUMNS} FROM outbound_actions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(action)
    }

    async fn select_eligible(&self, limit: i64) -> Result<Vec<OutboundAction>> {
        let actions = sqlx::query_as::<_, OutboundAction>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM outbound_actions
            WHERE status IN ('pending', 'failed')
              AND (next_attempt_at IS NULL OR next_attempt_at <= NOW())
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(actions)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_actions
            SET status = 'processing',
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'failed')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_sent(&self, id: Uuid, external_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbound_actions
            SET status = 'sent',
                external_id = $2,
                last_error = NULL,
                error_category = NULL,
                next_attempt_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('processing', 'sent')
            "#,
        )
        .bind(id)
        .bind(external_id)
        .execute(&self.pool)
        .await?;

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
        sqlx::query(
            r#"
            UPDATE outbound_actions
            SET status = 'failed',
                retry_count = $2,
                last_error = $3,
                error_category = $4,
                next_attempt_at = $5,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('sent', 'dead')
            "#,
        )
        .bind(id)
        .bind(retry_count)
        .bind(error)
        .bind(category)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_dead(
        &self,
        id: Uuid,
        retry_count: i32,
        error: &str,
        category: ErrorCategory,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbound_actions
            SET status = 'dead',
                retry_count = $2,
                last_error = $3,
                error_category = $4,
                next_attempt_at = NULL,
                dead_lettered_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status != 'sent'
            "#,
        )
        .bind(id)
        .bind(retry_count)
        .bind(error)
        .bind(category)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mutate_payload(&self, id: Uuid, patch: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbound_actions
            SET payload = payload || $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn retry(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_actions
            SET status = 'pending',
                next_attempt_at = NULL,
                dead_lettered_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('failed', 'dead')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_stuck_processing(&self, older_than: Duration) -> Result<i64> {
        let threshold = Utc::now() - older_than;
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM outbound_actions
            WHERE status = 'processing' AND updated_at < $1
            "#,
        )
        .bind(threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
