//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod outbound;
pub mod scheduled_tasks;
pub mod traits;

pub use deps::{DeliveryDeps, InstagramAdapter, PgContentCatalog, PgCredentialService};
pub use traits::*;
