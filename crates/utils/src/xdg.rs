use plasma_core::APP_NAME;
use std::env;
use std::path::PathBuf;

/// XDG Base Directory paths for plasma
pub struct XdgPaths;

impl XdgPaths {
    /// Get XDG_CACHE_HOME/plasma, falling back to the platform cache dir
    pub fn cache_dir() -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::cache_dir()
                    .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
                    .unwrap_or_else(|| PathBuf::from(".cache"))
            })
            .join(APP_NAME)
    }

    /// Directory holding the recipe cache store
    pub fn recipe_cache_dir() -> PathBuf {
        Self::cache_dir().join("recipes")
    }
}
