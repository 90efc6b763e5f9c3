//! Core domain types for the plasma engine.
//!
//! ## Organization
//!
//! - **`clock`**: time source used for cache expiry decisions
//! - **`environment`**: environment snapshots and the values folded into cache keys
//! - **`runtime`**: identity of the backend a recipe runs on

pub mod clock;
pub mod environment;
pub mod runtime;

pub use clock::*;
pub use environment::*;
pub use runtime::*;
