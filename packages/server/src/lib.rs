// Creator Engagement Automation - API Core
//
// This crate provides the fault-tolerant outbound delivery engine: a durable
// queue of platform actions (comment replies, direct messages, post
// publication, reposts) executed asynchronously with retry, exponential
// backoff, dead-lettering, and resumable multi-step publication.

pub mod config;
pub mod kernel;

pub use config::*;
