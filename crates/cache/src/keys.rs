//! Cache key construction
//!
//! A key is the SHA-256 of a canonical JSON document describing everything
//! that may influence a recipe's outputs: the recipe body, declared input
//! contents, declared environment, runtime identity and runtime options.
//! Every collection in that document is ordered, so the same logical recipe
//! always produces the same key regardless of directive order.

use crate::hashing::{resolve_inputs, ContentHasher, ResolvedInput};
use plasma_core::{EnvSnapshot, EnvValue, Error, Result};
use plasma_recipe::Recipe;
use plasma_utils::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Bumped whenever the key material layout changes
pub const KEY_SCHEMA_VERSION: u32 = 1;

const KEY_LEN: usize = 64;

/// Hex-encoded SHA-256 fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Parse a 64 character lowercase hex key
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != KEY_LEN || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(Error::configuration(format!("'{hex}' is not a cache key")));
        }
        Ok(Self(hex))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character directory shard
    #[must_use]
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }

    /// Abbreviated form for logs
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

#[derive(Serialize)]
struct InputContribution<'a> {
    path: &'a str,
    hash: &'a str,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    schema: u32,
    body: String,
    /// `None` when no input directive exists, distinct from an empty match
    inputs: Option<Vec<InputContribution<'a>>>,
    input_patterns: BTreeSet<&'a str>,
    outputs: BTreeSet<&'a str>,
    env: BTreeMap<String, EnvValue>,
    runtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime_version: Option<&'a str>,
    runtime_options: BTreeMap<&'a str, &'a str>,
}

/// Key plus the input files it was computed from
#[derive(Debug, Clone)]
pub struct KeyOutcome {
    pub key: CacheKey,
    pub inputs: Vec<ResolvedInput>,
}

/// Computes the cache key for one recipe against one environment
#[derive(Debug)]
pub struct KeyBuilder<'a> {
    recipe: &'a Recipe,
    env: &'a EnvSnapshot,
    runtime_version: Option<&'a str>,
}

impl<'a> KeyBuilder<'a> {
    #[must_use]
    pub fn new(recipe: &'a Recipe, env: &'a EnvSnapshot) -> Self {
        Self {
            recipe,
            env,
            runtime_version: None,
        }
    }

    /// Runtime version, folded in only when the recipe asks for it
    #[must_use]
    pub fn runtime_version(mut self, version: Option<&'a str>) -> Self {
        self.runtime_version = version;
        self
    }

    /// Hash inputs and derive the key.
    ///
    /// Fails with `PathEscape` or `InputUnavailable` before anything runs.
    pub fn build(self) -> Result<KeyOutcome> {
        let recipe = self.recipe;
        let declares_inputs = recipe.declares_inputs();
        let patterns = recipe.input_patterns();

        let inputs = if declares_inputs {
            resolve_inputs(recipe.dir(), patterns.iter().copied())?
        } else {
            Vec::new()
        };

        let runtime_version = if recipe.includes_runtime_version() {
            let version = self.runtime_version.ok_or_else(|| {
                Error::configuration(format!(
                    "recipe '{}' includes the runtime version in its key but none was resolved",
                    recipe.path().display()
                ))
            })?;
            Some(version)
        } else {
            None
        };

        let runtime_options: BTreeMap<&str, &str> = recipe
            .runtime_options()
            .map(|options| {
                options
                    .extra
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        let material = KeyMaterial {
            schema: KEY_SCHEMA_VERSION,
            body: sha256_hex(recipe.body().as_bytes()),
            inputs: declares_inputs.then(|| {
                inputs
                    .iter()
                    .map(|input| InputContribution {
                        path: &input.path,
                        hash: &input.hash,
                    })
                    .collect()
            }),
            input_patterns: patterns.iter().copied().collect(),
            outputs: recipe.output_prefixes().into_iter().collect(),
            env: self.env.resolve(recipe.env_names()),
            runtime: recipe.runtime().to_string(),
            runtime_version,
            runtime_options,
        };

        let mut hasher = ContentHasher::new();
        hasher.hash_content(&material)?;
        let key = CacheKey(hasher.finalize());

        debug!(
            recipe = %recipe.path().display(),
            key = %key.short(),
            inputs = inputs.len(),
            "Computed cache key"
        );

        Ok(KeyOutcome { key, inputs })
    }
}
