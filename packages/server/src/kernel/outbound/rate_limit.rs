//! Shared per-account throttle signal.
//!
//! One process-wide map of `account_id -> throttled_until`. The scanner
//! consults it before every dispatch so a backlog does not keep hammering an
//! account the platform already throttled. Purely a throughput optimization:
//! a rate-limited call that slips through still lands in the classifier and
//! backs off normally.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

#[derive(Default)]
pub struct RateLimitSignal {
    limits: RwLock<HashMap<Uuid, DateTime<Utc>>>,
}

impl RateLimitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `account_id` is throttled for the next `cooldown_secs`.
    /// Extends an existing cooldown, never shortens it.
    pub fn mark_limited(&self, account_id: Uuid, cooldown_secs: u64) {
        let until = Utc::now() + Duration::seconds(cooldown_secs.min(i64::MAX as u64) as i64);
        let mut limits = self.limits.write().unwrap();
        let entry = limits.entry(account_id).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }

    /// Whether dispatches to `account_id` should currently be skipped.
    pub fn is_limited(&self, account_id: Uuid) -> bool {
        let now = Utc::now();

        if let Some(until) = self.limits.read().unwrap().get(&account_id) {
            if *until > now {
                return true;
            }
        } else {
            return false;
        }

        // Cooldown elapsed; drop the stale entry.
        self.limits.write().unwrap().remove(&account_id);
        false
    }

    /// Number of accounts currently under a cooldown (expired entries count
    /// until their next `is_limited` check prunes them).
    pub fn limited_count(&self) -> usize {
        self.limits.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_account_is_not_limited() {
        let signal = RateLimitSignal::new();
        assert!(!signal.is_limited(Uuid::new_v4()));
    }

    #[test]
    fn marked_account_is_limited_until_cooldown_elapses() {
        let signal = RateLimitSignal::new();
        let account = Uuid::new_v4();

        signal.mark_limited(account, 60);
        assert!(signal.is_limited(account));
    }

    #[test]
    fn elapsed_cooldown_clears_and_prunes() {
        let signal = RateLimitSignal::new();
        let account = Uuid::new_v4();

        signal.mark_limited(account, 0);
        assert!(!signal.is_limited(account));
        assert_eq!(signal.limited_count(), 0);
    }

    #[test]
    fn cooldown_extends_but_never_shortens() {
        let signal = RateLimitSignal::new();
        let account = Uuid::new_v4();

        signal.mark_limited(account, 600);
        // A shorter cooldown arriving later must not cut the window down.
        signal.mark_limited(account, 1);
        assert!(signal.is_limited(account));
    }

    #[test]
    fn accounts_are_independent() {
        let signal = RateLimitSignal::new();
        let throttled = Uuid::new_v4();
        let free = Uuid::new_v4();

        signal.mark_limited(throttled, 60);
        assert!(signal.is_limited(throttled));
        assert!(!signal.is_limited(free));
    }
}
