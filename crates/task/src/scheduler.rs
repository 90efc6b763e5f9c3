//! Execution scheduler
//!
//! [`Engine::run`] is the entry point for running a recipe. It computes the
//! cache key, joins an identical in-flight execution if there is one, and
//! otherwise spawns a task that checks the store, executes on a miss and
//! publishes the result. Every caller for the same key receives the same
//! `Arc<RunOutcome>`.

use crate::backend::PortableInterpreter;
use crate::capture::materialize;
use crate::config::EngineConfig;
use crate::executor::{ExecutionResult, ExecutionStatus, Executor};
use crate::version::RuntimeVersions;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use plasma_cache::{
    CacheKey, CacheStore, EntryMeta, EntryStatus, EvictionReport, KeyBuilder, KeyOutcome,
    ResolvedInput,
};
use plasma_core::{Clock, EnvSnapshot, Error, Result, RuntimeKind, SystemClock};
use plasma_recipe::Recipe;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// How the cache took part in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from the store without executing
    Hit,
    /// Executed and published
    Stored,
    /// Executed but not published: failure, timeout or a read-only mode
    NotStored,
    /// The recipe or the engine has caching turned off
    Disabled,
    /// The store failed and was skipped for this run
    Bypassed,
}

/// Result of [`Engine::run`], shared by every caller that joined the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub key: CacheKey,
    pub result: ExecutionResult,
    pub cache: CacheStatus,
}

impl RunOutcome {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.result.status.exit_code()
    }
}

/// Counters across the engine's lifetime
#[derive(Debug, Default)]
pub struct EngineStats {
    executions: AtomicU64,
    cache_hits: AtomicU64,
    joins: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatsSnapshot {
    pub executions: u64,
    pub cache_hits: u64,
    pub joins: u64,
}

impl EngineStats {
    #[must_use]
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
        }
    }
}

type SharedRun = Shared<BoxFuture<'static, Arc<RunOutcome>>>;

struct EngineInner {
    config: EngineConfig,
    store: Option<CacheStore>,
    executor: Executor,
    versions: RuntimeVersions,
    env: EnvSnapshot,
    in_flight: DashMap<CacheKey, SharedRun>,
    permits: Arc<Semaphore>,
    stats: EngineStats,
}

/// Runs recipes with caching and in-flight deduplication
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("executor", &self.inner.executor)
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

/// Builder for [`Engine`]
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    portable: Option<Arc<dyn PortableInterpreter>>,
    clock: Option<Arc<dyn Clock>>,
    env: Option<EnvSnapshot>,
}

impl EngineBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Interpreter used for `portable` recipes
    #[must_use]
    pub fn portable_interpreter(mut self, interpreter: Arc<dyn PortableInterpreter>) -> Self {
        self.portable = Some(interpreter);
        self
    }

    /// Time source for cache expiry, the wall clock by default
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Environment recipes are keyed and run against, the process
    /// environment by default
    #[must_use]
    pub fn env(mut self, env: EnvSnapshot) -> Self {
        self.env = Some(env);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = if config.cache_mode.is_readable() || config.cache_mode.is_writable() {
            Some(CacheStore::open(&config.cache_dir, clock)?)
        } else {
            None
        };

        let executor = Executor::new(self.portable, config.timeout, config.output_policy);
        info!(
            cache_dir = %config.cache_dir.display(),
            cache_mode = %config.cache_mode,
            workers = config.workers,
            "Engine ready"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                permits: Arc::new(Semaphore::new(config.workers)),
                store,
                executor,
                versions: RuntimeVersions::new(),
                env: self.env.unwrap_or_else(EnvSnapshot::capture),
                in_flight: DashMap::new(),
                stats: EngineStats::default(),
                config,
            }),
        })
    }
}

impl Engine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Engine with `config`, the process environment and no portable
    /// interpreter
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// The cache store, absent when the cache mode is `off`
    #[must_use]
    pub fn store(&self) -> Option<&CacheStore> {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Compute the cache key and resolved inputs for `recipe`
    pub async fn key_for(&self, recipe: &Arc<Recipe>) -> Result<KeyOutcome> {
        let version = if recipe.includes_runtime_version() {
            Some(
                self.inner
                    .versions
                    .resolve(recipe.runtime(), self.inner.executor.portable_interpreter())
                    .await?,
            )
        } else {
            None
        };

        let recipe = Arc::clone(recipe);
        let env = self.inner.env.clone();
        tokio::task::spawn_blocking(move || {
            KeyBuilder::new(&recipe, &env)
                .runtime_version(version.as_deref())
                .build()
        })
        .await
        .map_err(|e| Error::configuration(format!("key computation task failed: {e}")))?
    }

    /// Freshness of the cache entry `recipe` would use
    pub async fn cache_status(&self, recipe: &Arc<Recipe>) -> Result<EntryStatus> {
        let Some(store) = self.store() else {
            return Ok(EntryStatus::Missing);
        };
        let outcome = self.key_for(recipe).await?;
        store.status(&outcome.key)
    }

    /// Load and run the recipe at `path`
    pub async fn run_path(
        &self,
        path: impl AsRef<Path>,
        runtime: Option<RuntimeKind>,
    ) -> Result<Arc<RunOutcome>> {
        let recipe = Recipe::load(path, runtime).await?;
        self.run(Arc::new(recipe)).await
    }

    /// Run `recipe`, reusing a cached or in-flight result when possible.
    ///
    /// Errors are limited to problems found before anything executes: key
    /// construction failures such as `PathEscape` or `InputUnavailable`.
    /// Execution failures and timeouts are reported in the outcome.
    pub async fn run(&self, recipe: Arc<Recipe>) -> Result<Arc<RunOutcome>> {
        let KeyOutcome { key, inputs } = self.key_for(&recipe).await?;

        let shared = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                self.inner.stats.joins.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key.short(), "Joining in-flight execution");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let span = tracing::info_span!(
                    "run",
                    recipe = %recipe.path().display(),
                    key = %key.short()
                );
                let handle = tokio::spawn(
                    async move { inner.run_keyed(recipe, task_key, inputs).await }
                        .instrument(span),
                );
                let failed_key = key.clone();
                let shared = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => Arc::new(RunOutcome {
                            key: failed_key,
                            result: ExecutionResult {
                                status: ExecutionStatus::Failed {
                                    message: format!("execution task aborted: {e}"),
                                    exit_code: None,
                                },
                                outputs: Default::default(),
                                duration: Duration::ZERO,
                            },
                            cache: CacheStatus::NotStored,
                        }),
                    }
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                shared
            }
        };

        Ok(shared.await)
    }

    /// Periodically evict expired entries until the handle is aborted
    pub fn spawn_eviction(&self, interval: Duration) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(store) = inner.store.as_ref() {
                    match store.evict_expired() {
                        Ok(report) => debug!(?report, "Eviction pass finished"),
                        Err(e) => warn!(error = %e, "Eviction pass failed"),
                    }
                }
            }
        })
    }

    /// Run one eviction pass now
    pub fn evict_expired(&self) -> Result<EvictionReport> {
        match self.store() {
            Some(store) => store.evict_expired(),
            None => Ok(EvictionReport::default()),
        }
    }
}

impl EngineInner {
    async fn run_keyed(
        self: Arc<Self>,
        recipe: Arc<Recipe>,
        key: CacheKey,
        inputs: Vec<ResolvedInput>,
    ) -> Arc<RunOutcome> {
        let outcome = Arc::new(self.execute_or_reuse(&recipe, &key, &inputs).await);
        self.in_flight.remove(&key);
        outcome
    }

    async fn execute_or_reuse(
        &self,
        recipe: &Recipe,
        key: &CacheKey,
        inputs: &[ResolvedInput],
    ) -> RunOutcome {
        let _permit = Arc::clone(&self.permits).acquire_owned().await.ok();

        let ttl = recipe.cache_ttl();
        let mode = self.config.cache_mode;
        let store = self.store.as_ref().filter(|_| ttl.is_some());
        let mut bypassed = false;

        if let Some(store) = store.filter(|_| mode.is_readable()) {
            match store.lookup(key) {
                Ok(Some(entry)) => {
                    self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                    info!("Cache hit");
                    self.materialize(recipe, &entry.artifacts);
                    return RunOutcome {
                        key: key.clone(),
                        result: ExecutionResult {
                            status: ExecutionStatus::Succeeded,
                            outputs: entry.artifacts,
                            duration: Duration::ZERO,
                        },
                        cache: CacheStatus::Hit,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Cache lookup failed, executing and replacing the entry");
                    bypassed = true;
                }
            }
        }

        self.stats.executions.fetch_add(1, Ordering::Relaxed);
        let result = self.executor.execute(recipe, inputs, &self.env).await;

        let runtime_version = if recipe.includes_runtime_version() {
            self.versions
                .resolve(recipe.runtime(), self.executor.portable_interpreter())
                .await
                .ok()
        } else {
            None
        };

        let cache = match (store, ttl) {
            _ if !result.succeeded() => CacheStatus::NotStored,
            (Some(store), Some(ttl)) if mode.is_writable() => {
                let meta = EntryMeta {
                    recipe: recipe.path().to_path_buf(),
                    runtime: recipe.runtime().to_string(),
                    runtime_version,
                    duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
                };
                match store.put(key, &result.outputs, ttl, meta) {
                    Ok(_) => CacheStatus::Stored,
                    Err(e) => {
                        warn!(error = %e, "Cache publish failed, bypassing cache");
                        CacheStatus::Bypassed
                    }
                }
            }
            (Some(_), Some(_)) if bypassed => CacheStatus::Bypassed,
            (Some(_), Some(_)) => CacheStatus::NotStored,
            _ => CacheStatus::Disabled,
        };

        if result.succeeded() {
            self.materialize(recipe, &result.outputs);
        }

        RunOutcome {
            key: key.clone(),
            result,
            cache,
        }
    }

    fn materialize(&self, recipe: &Recipe, artifacts: &plasma_cache::Artifacts) {
        if !self.config.materialize_outputs || artifacts.is_empty() {
            return;
        }
        if let Err(e) = materialize(recipe.dir(), artifacts) {
            warn!(error = %e, "Materializing outputs failed");
        }
    }
}
