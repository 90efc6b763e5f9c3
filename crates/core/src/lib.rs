//! Core domain types, errors, and constants for the plasma recipe engine.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate in
//!   the workspace. Parse, key-construction, capability and execution failures
//!   all live here so callers can match on one taxonomy.
//! - **`types`**: runtime identity (`RuntimeKind`), environment snapshots and
//!   the `Clock` abstraction used for cache expiry.
//! - **`constants`**: environment variable names and fixed markers.

pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, IoResultExt, Result, ResultExt},
    types::*,
};
