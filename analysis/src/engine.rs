//! Engine lifecycle — lazily builds the analysis engine from configuration
//! and rebuilds it after configuration changes.
//!
//! The current engine lives in an [`ArcSwapOption`]: an empty slot means
//! "not built yet". Readers clone the `Arc` and keep using that instance even
//! if it is invalidated mid-call; the engine is dropped (disposed) once the
//! last reader releases it.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use vigil_config::AnalysisConfig;

use crate::types::{EngineRange, Issue};
use crate::workspace::Workspace;

/// Engine call future type alias.
pub type EngineFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EngineError>> + Send + 'a>>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Analysis is turned off; the caller should skip, not report.
    #[error("script analysis is unavailable")]
    Unavailable,
    #[error("failed to start analysis engine: {0}")]
    Spawn(String),
    #[error("analysis engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("analysis engine protocol error: {0}")]
    Protocol(String),
    #[error("analysis engine timed out after {0}s")]
    Timeout(u64),
    #[error("analysis engine failed: {0}")]
    Failed(String),
}

impl EngineError {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// The black-box static analyzer and formatter.
pub trait AnalysisEngine: Send + Sync {
    /// Analyze `text`. `settings` overrides the engine's configured rules.
    fn analyze<'a>(&'a self, text: &'a str, settings: Option<&'a Value>)
    -> EngineFuture<'a, Vec<Issue>>;

    /// Format `text`, optionally restricted to `range`.
    fn format<'a>(
        &'a self,
        text: &'a str,
        settings: &'a Value,
        range: Option<EngineRange>,
    ) -> EngineFuture<'a, Option<String>>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Stand-in used while analysis is turned off. Every call fails with
/// [`EngineError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEngine;

impl AnalysisEngine for DisabledEngine {
    fn analyze<'a>(
        &'a self,
        _text: &'a str,
        _settings: Option<&'a Value>,
    ) -> EngineFuture<'a, Vec<Issue>> {
        Box::pin(async { Err(EngineError::Unavailable) })
    }

    fn format<'a>(
        &'a self,
        _text: &'a str,
        _settings: &'a Value,
        _range: Option<EngineRange>,
    ) -> EngineFuture<'a, Option<String>> {
        Box::pin(async { Err(EngineError::Unavailable) })
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Which rules an engine is built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleProfile {
    SettingsFile(PathBuf),
    IncludedRules(Vec<String>),
}

/// Builds engine instances.
pub trait EngineFactory: Send + Sync {
    fn build(&self, profile: &RuleProfile) -> Result<Arc<dyn AnalysisEngine>, EngineError>;
}

/// Owns zero or one engine built from the current configuration.
pub struct EngineManager {
    factory: Arc<dyn EngineFactory>,
    workspace: Arc<dyn Workspace>,
    config: ArcSwap<AnalysisConfig>,
    current: ArcSwapOption<Arc<dyn AnalysisEngine>>,
    /// Serializes builds so concurrent first callers construct one engine.
    init: Mutex<()>,
    /// Bumped on invalidation; a build that started under an older
    /// generation is returned to its caller but not installed.
    generation: AtomicU64,
}

impl EngineManager {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        workspace: Arc<dyn Workspace>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            factory,
            workspace,
            config: ArcSwap::from_pointee(config),
            current: ArcSwapOption::empty(),
            init: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<AnalysisConfig> {
        self.config.load_full()
    }

    /// Whether configuration has analysis switched on. Does not build.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.load().enable
    }

    /// The current engine, building it on first use.
    pub fn get_engine(&self) -> Arc<dyn AnalysisEngine> {
        if let Some(engine) = self.current.load_full() {
            return Arc::clone(&*engine);
        }

        let _guard = self.init.lock();
        if let Some(engine) = self.current.load_full() {
            return Arc::clone(&*engine);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let engine = self.build();
        if self.generation.load(Ordering::Acquire) == generation {
            self.current.store(Some(Arc::new(Arc::clone(&engine))));
        }
        engine
    }

    /// Drop the current engine; the next [`get_engine`](Self::get_engine)
    /// rebuilds. Calls already holding the old engine run to completion.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if self.current.swap(None).is_some() {
            tracing::debug!("Analysis engine invalidated");
        }
    }

    /// Install new configuration and invalidate the engine built from the old one.
    pub fn update_config(&self, config: AnalysisConfig) {
        self.config.store(Arc::new(config));
        self.invalidate();
    }

    fn build(&self) -> Arc<dyn AnalysisEngine> {
        let config = self.config.load_full();
        if !config.enable {
            tracing::debug!("Script analysis disabled by configuration");
            return Arc::new(DisabledEngine);
        }

        let profile = self.rule_profile(&config);
        match self.factory.build(&profile) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::error!("Failed to build analysis engine: {e}");
                Arc::new(DisabledEngine)
            }
        }
    }

    fn rule_profile(&self, config: &AnalysisConfig) -> RuleProfile {
        if let Some(configured) = config.settings_path() {
            if let Some(path) = self.workspace.resolve_workspace_path(configured) {
                tracing::info!(
                    "Configuring analysis engine with rules at '{}'",
                    path.display()
                );
                return RuleProfile::SettingsFile(path);
            }
            tracing::error!(
                "Unable to find analysis settings file at '{configured}'. Loading default rules."
            );
        } else {
            tracing::info!("Analysis settings file not configured. Falling back to default rules");
        }
        RuleProfile::IncludedRules(config.included_rules())
    }
}
