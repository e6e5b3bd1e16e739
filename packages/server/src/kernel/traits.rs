// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (retry policy, resumption) lives in the outbound engine and
// uses these traits.
//
// Naming convention: Base* for trait names (e.g., BasePlatformService)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use instagram::InstagramError;

use crate::kernel::outbound::action::MediaType;
use crate::kernel::outbound::events::DeliveryEvent;

// =============================================================================
// Platform Service Trait (Infrastructure - Graph API calls)
// =============================================================================

/// Credentials resolved for one connected account.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    /// The platform-side user id calls are issued against.
    pub platform_user_id: String,
    pub access_token: String,
}

/// Outbound calls against the platform. One method per side effect the
/// executors perform; errors stay typed so the classifier can match on them.
#[async_trait]
pub trait BasePlatformService: Send + Sync {
    /// Reply to a comment; returns the created reply's id.
    async fn reply_to_comment(
        &self,
        credentials: &AccountCredentials,
        comment_id: &str,
        text: &str,
    ) -> Result<String, InstagramError>;

    /// Send a direct message (fresh or as a thread reply); returns the
    /// message id.
    async fn send_message(
        &self,
        credentials: &AccountCredentials,
        recipient_id: &str,
        text: &str,
    ) -> Result<String, InstagramError>;

    /// Step 1 of publishing: create an unpublished media container.
    async fn create_media_container(
        &self,
        credentials: &AccountCredentials,
        media_url: &str,
        caption: &str,
        media_type: MediaType,
    ) -> Result<String, InstagramError>;

    /// Step 2 of publishing: publish a container created earlier.
    async fn publish_media_container(
        &self,
        credentials: &AccountCredentials,
        creation_id: &str,
    ) -> Result<String, InstagramError>;
}

// =============================================================================
// Credential Service Trait (Infrastructure)
// =============================================================================

/// Resolves the stored token for a connected account. Token acquisition,
/// refresh, and decryption happen upstream of this service.
#[async_trait]
pub trait BaseCredentialService: Send + Sync {
    async fn resolve(&self, account_id: Uuid) -> Result<AccountCredentials>;
}

// =============================================================================
// Content Catalog Trait (Infrastructure - denormalized source records)
// =============================================================================

/// Source media re-resolved from a repost grant at execution time.
#[derive(Debug, Clone)]
pub struct RepostSource {
    pub media_url: String,
    pub caption: String,
    pub media_type: MediaType,
    pub owner_username: Option<String>,
}

#[async_trait]
pub trait BaseContentCatalog: Send + Sync {
    /// Look up a repost grant. `None` means missing or revoked.
    async fn find_repost_source(&self, permission_id: Uuid) -> Result<Option<RepostSource>>;

    /// Mark a scheduled post as published. Best-effort from the caller's
    /// perspective; an error here never fails the action.
    async fn mark_post_published(&self, post_id: Uuid, media_id: &str) -> Result<()>;
}

// =============================================================================
// Telemetry Sink Trait (Infrastructure)
// =============================================================================

/// Best-effort event recording. The signature is infallible on purpose:
/// implementations swallow and log their own failures.
#[async_trait]
pub trait BaseTelemetrySink: Send + Sync {
    async fn record(&self, event: DeliveryEvent);
}
