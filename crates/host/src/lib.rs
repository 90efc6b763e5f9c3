//! Host capabilities for recipes
//!
//! Portable recipes never touch the filesystem or spawn processes directly.
//! Every side effect goes through [`HostCapabilities`], whose production
//! implementation [`HostBridge`] confines paths to a [`HostScope`] and records
//! what happened in an [`EffectLog`].

pub mod bridge;
pub mod content;
pub mod effects;
pub mod process;
pub mod scope;

pub use bridge::{HostBridge, HostCapabilities};
pub use content::FileContent;
pub use effects::{EffectLog, HostEffect};
pub use process::{run_process, scrubbed_command, ProcessOutput};
pub use scope::{HostScope, OutputPolicy, ScopedPath};
