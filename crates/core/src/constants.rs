/// Constants used throughout the plasma codebase
// Directive marker recognised in a recipe's leading comment block
pub const DIRECTIVE_MARKER: &str = "PLASMA";

// Application name used for XDG directories and temp prefixes
pub const APP_NAME: &str = "plasma";

// Environment variable names
pub const PLASMA_LOG_VAR: &str = "PLASMA_LOG";
pub const PLASMA_CACHE_DIR_VAR: &str = "PLASMA_CACHE_DIR";
pub const PLASMA_CACHE_MODE_VAR: &str = "PLASMA_CACHE_MODE";
pub const PLASMA_TIMEOUT_VAR: &str = "PLASMA_TIMEOUT";
pub const PLASMA_WORKERS_VAR: &str = "PLASMA_WORKERS";

// Variables every spawned process inherits regardless of declared env
pub const BASELINE_ENV_VARS: &[&str] = &["PATH", "HOME"];

// Runtime kind name for the embedded interpreter
pub const PORTABLE_RUNTIME: &str = "portable";

// Prefix for subprocess runtimes (`standard:node`)
pub const STANDARD_RUNTIME_PREFIX: &str = "standard:";
