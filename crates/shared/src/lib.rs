//! # errchan-shared
//!
//! Shared error envelope, result types, and cancellation scopes for the
//! errchan workspace.
//!
//! - [`ErrorEnvelope`] - structured error shared by every crate
//! - [`RequestContext`] - hierarchical cancellation scope plus correlation id
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Serde-compatible** - Error types support serialization

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod result;

pub use concurrency::{CorrelationId, RequestContext};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use result::Result;
