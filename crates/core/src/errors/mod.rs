//! Error types and result extensions for plasma operations

mod builders;
mod extensions;
mod types;

pub use extensions::*;
pub use types::{Error, Result};
