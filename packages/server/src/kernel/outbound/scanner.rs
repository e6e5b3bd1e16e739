//! Delivery scanner: the periodic tick that drains the queue.
//!
//! One tick selects eligible actions and drives each through its executor,
//! strictly sequentially, so a batch never floods one account. Ticks are
//! single-flight: a firing that arrives while another tick is still running
//! is skipped entirely.
//!
//! ```text
//! tick()
//!     │
//!     ├─► select_eligible(batch_size)
//!     ├─► per action: rate-limit check → mark_processing → dispatch
//!     └─► settle: mark_sent | mark_failed(+backoff) | mark_dead
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::action::OutboundAction;
use super::backoff::retry_delay;
use super::classify::classify;
use super::error::DeliveryError;
use super::events::DeliveryEvent;
use super::rate_limit::RateLimitSignal;
use super::registry::ExecutorRegistry;
use crate::kernel::deps::DeliveryDeps;

/// Configuration for the delivery scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Maximum number of actions to pick up per tick.
    pub batch_size: i64,
    /// Attempts (including the first) before an action is dead-lettered.
    pub max_retries: i32,
    /// Age past which a `processing` row counts as stuck (crash footprint).
    pub stuck_processing_after: chrono::Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_retries: 5,
            stuck_processing_after: chrono::Duration::minutes(30),
        }
    }
}

/// What one tick did; returned for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// False when the firing was skipped because a tick was already running.
    pub ran: bool,
    pub selected: usize,
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
    pub skipped_rate_limited: usize,
    /// Lost the `mark_processing` race (another process got there first).
    pub skipped_contended: usize,
}

impl TickSummary {
    fn skipped() -> Self {
        Self::default()
    }
}

pub struct DeliveryScanner {
    deps: DeliveryDeps,
    registry: Arc<ExecutorRegistry>,
    rate_limits: Arc<RateLimitSignal>,
    config: ScannerConfig,
    in_flight: AtomicBool,
}

impl DeliveryScanner {
    pub fn new(
        deps: DeliveryDeps,
        registry: Arc<ExecutorRegistry>,
        rate_limits: Arc<RateLimitSignal>,
    ) -> Self {
        Self::with_config(deps, registry, rate_limits, ScannerConfig::default())
    }

    pub fn with_config(
        deps: DeliveryDeps,
        registry: Arc<ExecutorRegistry>,
        rate_limits: Arc<RateLimitSignal>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            deps,
            registry,
            rate_limits,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one tick, unless one is already in flight.
    pub async fn tick(&self) -> Result<TickSummary> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("delivery tick already in flight, skipping this firing");
            return Ok(TickSummary::skipped());
        }

        let result = self.run_tick().await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_tick(&self) -> Result<TickSummary> {
        let mut summary = TickSummary {
            ran: true,
            ..TickSummary::default()
        };

        // Crash footprints: rows stuck at `processing`. Alarm only; there is
        // no automatic reclaim.
        match self
            .deps
            .store
            .count_stuck_processing(self.config.stuck_processing_after)
            .await
        {
            Ok(stuck) if stuck > 0 => {
                warn!(count = stuck, "actions stuck in processing; operator attention needed");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to count stuck processing actions"),
        }

        let actions = self.deps.store.select_eligible(self.config.batch_size).await?;
        summary.selected = actions.len();
        if actions.is_empty() {
            return Ok(summary);
        }

        debug!(count = actions.len(), "selected eligible outbound actions");

        // Strictly sequential: bounds load on any one account and keeps the
        // rate-limit signal single-threaded.
        for action in &actions {
            self.process_action(action, &mut summary).await;
        }

        info!(
            selected = summary.selected,
            sent = summary.sent,
            retried = summary.retried,
            dead = summary.dead,
            rate_limited = summary.skipped_rate_limited,
            "delivery tick complete"
        );

        Ok(summary)
    }

    async fn process_action(&self, action: &OutboundAction, summary: &mut TickSummary) {
        if self.rate_limits.is_limited(action.account_id) {
            debug!(
                action_id = %action.id,
                account_id = %action.account_id,
                "account rate limited, leaving action for a later tick"
            );
            summary.skipped_rate_limited += 1;
            return;
        }

        // The status transition is the lock: losing it means another worker
        // already owns this action.
        match self.deps.store.mark_processing(action.id).await {
            Ok(true) => {}
            Ok(false) => {
                summary.skipped_contended += 1;
                return;
            }
            Err(e) => {
                error!(action_id = %action.id, error = %e, "failed to mark action processing");
                return;
            }
        }

        debug!(
            action_id = %action.id,
            kind = action.kind.as_str(),
            "executing outbound action"
        );

        match self.registry.dispatch(action, &self.deps).await {
            Ok(external_id) => {
                if let Err(e) = self.deps.store.mark_sent(action.id, &external_id).await {
                    error!(action_id = %action.id, error = %e, "failed to mark action sent");
                    return;
                }
                summary.sent += 1;

                self.deps
                    .telemetry
                    .record(DeliveryEvent::Sent {
                        action_id: action.id,
                        account_id: action.account_id,
                        kind: action.kind,
                        external_id,
                    })
                    .await;
            }
            Err(error) => {
                warn!(
                    action_id = %action.id,
                    kind = action.kind.as_str(),
                    error = %error,
                    "outbound action failed"
                );
                self.settle_failure(action, &error, summary).await;
            }
        }
    }

    async fn settle_failure(
        &self,
        action: &OutboundAction,
        error: &DeliveryError,
        summary: &mut TickSummary,
    ) {
        let classification = classify(error);
        let attempts = action.retry_count + 1;
        let error_text = error.to_string();

        if let Some(cooldown_secs) = classification.cooldown_secs {
            self.rate_limits
                .mark_limited(action.account_id, cooldown_secs);
        }

        if !classification.retryable || attempts >= self.config.max_retries {
            if let Err(e) = self
                .deps
                .store
                .mark_dead(action.id, attempts, &error_text, classification.category)
                .await
            {
                error!(action_id = %action.id, error = %e, "failed to mark action dead");
                return;
            }
            summary.dead += 1;

            self.deps
                .telemetry
                .record(DeliveryEvent::DeadLettered {
                    action_id: action.id,
                    account_id: action.account_id,
                    kind: action.kind,
                    category: classification.category,
                    total_attempts: attempts,
                    error: error_text,
                })
                .await;
        } else {
            let next_attempt_at = Utc::now() + retry_delay(attempts);
            if let Err(e) = self
                .deps
                .store
                .mark_failed(
                    action.id,
                    attempts,
                    &error_text,
                    classification.category,
                    next_attempt_at,
                )
                .await
            {
                error!(action_id = %action.id, error = %e, "failed to mark action failed");
                return;
            }
            summary.retried += 1;

            self.deps
                .telemetry
                .record(DeliveryEvent::Failed {
                    action_id: action.id,
                    account_id: action.account_id,
                    kind: action.kind,
                    category: classification.category,
                    attempt: attempts,
                    will_retry: true,
                    error: error_text,
                })
                .await;
        }
    }
}
