//! Recipe execution for plasma
//!
//! This crate turns parsed recipes into results:
//!
//! - [`Engine`] schedules runs, deduplicates identical in-flight work and
//!   consults the cache store
//! - [`Executor`] stages a private workspace and runs the selected backend
//!   under a timeout
//! - [`backend`] holds the portable and standard backends
//! - [`EngineConfig`] carries settings and their `PLASMA_*` overrides

pub mod backend;
pub mod capture;
pub mod config;
pub mod executor;
pub mod scheduler;
pub mod staging;
pub mod version;

pub use backend::{PortableInterpreter, StandardBackend};
pub use config::{EngineConfig, DEFAULT_TIMEOUT};
pub use executor::{
    recipe_environment, ExecutionResult, ExecutionState, ExecutionStatus, Executor,
    TIMEOUT_EXIT_CODE,
};
pub use scheduler::{CacheStatus, Engine, EngineBuilder, EngineStatsSnapshot, RunOutcome};
pub use staging::Workspace;
