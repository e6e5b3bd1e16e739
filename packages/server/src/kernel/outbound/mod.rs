//! Outbound action delivery engine.
//!
//! Reliably delivers side-effecting platform actions (comment replies,
//! direct messages, post publication, reposts) enqueued by upstream business
//! logic, with automatic retry, exponential backoff, dead-lettering, and
//! idempotent resumption of two-step publish flows.
//!
//! # Architecture
//!
//! ```text
//! upstream logic ──► ActionStore.insert (status = pending)
//!
//! scheduler ──► DeliveryScanner.tick()
//!     │
//!     ├─► ActionStore.select_eligible()
//!     ├─► RateLimitSignal check (skip throttled accounts)
//!     ├─► ActionStore.mark_processing (the mutual-exclusion point)
//!     ├─► ExecutorRegistry.dispatch ──► Graph API
//!     └─► settle: mark_sent | classify → mark_failed(+backoff) | mark_dead
//! ```
//!
//! Failure policy lives in one place (`classify`); executors only report what
//! happened. Multi-step executors persist resumption state into the action
//! payload before each subsequent external call, so retries never repeat a
//! completed create step.

pub mod action;
pub mod backoff;
pub mod classify;
pub mod error;
pub mod events;
pub mod executors;
pub mod rate_limit;
pub mod registry;
pub mod scanner;
pub mod store;
pub mod testing;

pub use action::{
    ActionKind, ActionStatus, CommentReplyPayload, MediaType, MessagePayload, OutboundAction,
    PublishPostPayload, RepostPayload,
};
pub use backoff::retry_delay;
pub use classify::{classify, Classification, ErrorCategory};
pub use error::DeliveryError;
pub use events::{DeliveryEvent, LogTelemetry};
pub use rate_limit::RateLimitSignal;
pub use registry::{default_registry, ActionExecutor, ExecutorRegistry};
pub use scanner::{DeliveryScanner, ScannerConfig, TickSummary};
pub use store::{ActionStore, MemoryActionStore, PgActionStore};
