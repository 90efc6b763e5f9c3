//! Shared utilities for plasma
//!
//! Small, dependency-light helpers used by the cache store, the host bridge
//! and the executor: crash-safe file publication, content digests, glob
//! expansion, lexical path checks, XDG directory resolution and tracing setup.

pub mod atomic_file;
pub mod digest;
pub mod glob;
pub mod paths;
pub mod tracing;
pub mod xdg;

pub use atomic_file::*;
pub use digest::{hash_file, sha256_hex};
pub use glob::{compile_glob, expand_glob};
pub use paths::{normalize_relative, pattern_escapes, to_slash};
pub use xdg::*;
