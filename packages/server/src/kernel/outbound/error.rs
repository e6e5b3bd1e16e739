//! Typed execution errors for the delivery engine.
//!
//! Executors return `DeliveryError`; the classifier in `classify.rs` is the
//! only place that turns one into a retry decision.

use thiserror::Error;
use uuid::Uuid;

use instagram::InstagramError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A Graph API call failed.
    #[error("platform api: {0}")]
    Platform(#[from] InstagramError),

    /// Credentials for the account could not be resolved.
    #[error("credentials for account {account_id}: {message}")]
    Credentials { account_id: Uuid, message: String },

    /// The stored payload does not match the action kind's shape.
    #[error("invalid action payload: {0}")]
    Payload(String),

    /// A denormalized source record (e.g. a repost grant) is gone or revoked.
    #[error("source record unavailable: {0}")]
    SourceUnavailable(String),

    /// Infrastructure failure inside the engine itself (store, etc.).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
