//! Failure classification.
//!
//! Executors never decide retryability themselves; every failure flows
//! through [`classify`], the single policy point for the whole engine.

use serde::{Deserialize, Serialize};

use instagram::InstagramError;

use super::error::DeliveryError;

/// Cooldown applied when the platform throttles us without saying for how
/// long. Long enough to ride out a Graph API hourly window without parking
/// the queue for the full hour.
pub const DEFAULT_RATE_LIMIT_COOLDOWN_SECS: u64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "error_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The platform is throttling the destination account.
    RateLimit,
    /// Credentials rejected; needs a token refresh, not a retry.
    Auth,
    /// Malformed payload or missing source record: an upstream defect.
    Validation,
    /// Network or server-side failure; expected to clear on its own.
    Transient,
    /// Anything unanticipated. Retryable, so nothing is silently dropped.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retryable: bool,
    pub category: ErrorCategory,
    /// Only set for rate limits: how long to back off the whole account.
    pub cooldown_secs: Option<u64>,
}

impl Classification {
    fn retryable(category: ErrorCategory) -> Self {
        Self {
            retryable: true,
            category,
            cooldown_secs: None,
        }
    }

    fn permanent(category: ErrorCategory) -> Self {
        Self {
            retryable: false,
            category,
            cooldown_secs: None,
        }
    }
}

/// Map an execution failure to a retry decision.
pub fn classify(error: &DeliveryError) -> Classification {
    match error {
        DeliveryError::Platform(platform) => classify_platform(platform),
        DeliveryError::Credentials { .. } => Classification::permanent(ErrorCategory::Auth),
        DeliveryError::Payload(_) => Classification::permanent(ErrorCategory::Validation),
        DeliveryError::SourceUnavailable(_) => {
            Classification::permanent(ErrorCategory::Validation)
        }
        DeliveryError::Internal(_) => Classification::retryable(ErrorCategory::Unknown),
    }
}

fn classify_platform(error: &InstagramError) -> Classification {
    match error {
        InstagramError::RateLimited { retry_after_secs } => Classification {
            retryable: true,
            category: ErrorCategory::RateLimit,
            cooldown_secs: Some(retry_after_secs.unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN_SECS)),
        },
        InstagramError::Unauthorized { .. } => Classification::permanent(ErrorCategory::Auth),
        InstagramError::Invalid { .. } => Classification::permanent(ErrorCategory::Validation),
        // Server-side trouble clears on its own; so do connect failures and
        // timeouts.
        InstagramError::Api { status, .. } if *status >= 500 => {
            Classification::retryable(ErrorCategory::Transient)
        }
        InstagramError::Http(_) => Classification::retryable(ErrorCategory::Transient),
        InstagramError::Api { .. } | InstagramError::UnexpectedResponse(_) => {
            Classification::retryable(ErrorCategory::Unknown)
        }
    }
}
