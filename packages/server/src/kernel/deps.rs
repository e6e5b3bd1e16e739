//! Delivery dependencies for executors (using traits for testability)
//!
//! This module provides the central dependency container used by the scanner
//! and the action executors. All external services use trait abstractions to
//! enable testing.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use instagram::{InstagramError, InstagramService};

use crate::kernel::outbound::action::MediaType;
use crate::kernel::outbound::store::ActionStore;
use crate::kernel::traits::{
    AccountCredentials, BaseContentCatalog, BaseCredentialService, BasePlatformService,
    BaseTelemetrySink, RepostSource,
};

// =============================================================================
// InstagramService Adapter (implements BasePlatformService trait)
// =============================================================================

/// Wrapper around InstagramService that implements BasePlatformService trait
pub struct InstagramAdapter(pub Arc<InstagramService>);

impl InstagramAdapter {
    pub fn new(service: Arc<InstagramService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BasePlatformService for InstagramAdapter {
    async fn reply_to_comment(
        &self,
        credentials: &AccountCredentials,
        comment_id: &str,
        text: &str,
    ) -> Result<String, InstagramError> {
        self.0
            .reply_to_comment(&credentials.access_token, comment_id, text)
            .await
    }

    async fn send_message(
        &self,
        credentials: &AccountCredentials,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InstagramError> {
        self.0
            .send_message(
                &credentials.access_token,
                &credentials.platform_user_id,
                recipient_id,
                text,
            )
            .await
    }

    async fn create_media_container(
        &self,
        credentials: &AccountCredentials,
        media_url: &str,
        caption: &str,
        media_type: MediaType,
    ) -> Result<String, InstagramError> {
        self.0
            .create_media_container(
                &credentials.access_token,
                &credentials.platform_user_id,
                media_url,
                caption,
                media_type.as_str(),
            )
            .await
    }

    async fn publish_media_container(
        &self,
        credentials: &AccountCredentials,
        creation_id: &str,
    ) -> Result<String, InstagramError> {
        self.0
            .publish_media_container(
                &credentials.access_token,
                &credentials.platform_user_id,
                creation_id,
            )
            .await
    }
}

// =============================================================================
// Postgres-backed credential resolution
// =============================================================================

/// Reads the resolved token for a connected account. Acquisition, refresh and
/// decryption are upstream concerns; a missing or inactive row is an auth
/// failure from the delivery engine's perspective.
pub struct PgCredentialService {
    pool: PgPool,
}

impl PgCredentialService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseCredentialService for PgCredentialService {
    async fn resolve(&self, account_id: Uuid) -> Result<AccountCredentials> {
        let row = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT platform_user_id, access_token
            FROM connected_accounts
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(platform_user_id, access_token)| AccountCredentials {
            platform_user_id,
            access_token,
        })
        .ok_or_else(|| anyhow!("no active connected account {}", account_id))
    }
}

// =============================================================================
// Postgres-backed content catalog
// =============================================================================

pub struct PgContentCatalog {
    pool: PgPool,
}

impl PgContentCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseContentCatalog for PgContentCatalog {
    async fn find_repost_source(&self, permission_id: Uuid) -> Result<Option<RepostSource>> {
        let row = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            r#"
            SELECT media_url, caption, media_type, owner_username
            FROM repost_permissions
            WHERE id = $1 AND status = 'granted'
            "#,
        )
        .bind(permission_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(media_url, caption, media_type, owner_username)| RepostSource {
            media_url,
            caption,
            media_type: match media_type.as_str() {
                "video" => MediaType::Video,
                "reel" => MediaType::Reel,
                _ => MediaType::Image,
            },
            owner_username,
        }))
    }

    async fn mark_post_published(&self, post_id: Uuid, media_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'published',
                published_media_id = $2,
                published_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .bind(media_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// DeliveryDeps
// =============================================================================

/// Delivery dependencies accessible to the scanner and executors.
#[derive(Clone)]
pub struct DeliveryDeps {
    pub store: Arc<dyn ActionStore>,
    pub platform: Arc<dyn BasePlatformService>,
    pub credentials: Arc<dyn BaseCredentialService>,
    pub catalog: Arc<dyn BaseContentCatalog>,
    pub telemetry: Arc<dyn BaseTelemetrySink>,
}

impl DeliveryDeps {
    pub fn new(
        store: Arc<dyn ActionStore>,
        platform: Arc<dyn BasePlatformService>,
        credentials: Arc<dyn BaseCredentialService>,
        catalog: Arc<dyn BaseContentCatalog>,
        telemetry: Arc<dyn BaseTelemetrySink>,
    ) -> Self {
        Self {
            store,
            platform,
            credentials,
            catalog,
            telemetry,
        }
    }
}
