//! Shared test doubles.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::engine::{AnalysisEngine, EngineError, EngineFactory, EngineFuture, RuleProfile};
use crate::publish::DiagnosticsPublisher;
use crate::types::{Diagnostic, EngineRange, Fix, Issue, IssueLevel, SourceRange, TextEdit};

pub(crate) fn issue(rule: &str, range: SourceRange, fix: Option<Fix>) -> Issue {
    Issue {
        level: IssueLevel::Warning,
        rule_name: Some(rule.to_string()),
        message: format!("{rule} violated"),
        source: None,
        range,
        fix,
    }
}

pub(crate) fn fix(text: &str) -> Fix {
    Fix {
        description: format!("replace with {text}"),
        edits: vec![TextEdit {
            range: SourceRange::new(1, 1, 1, 1),
            text: text.to_string(),
        }],
    }
}

/// Engine whose results are keyed by the analyzed text.
///
/// Unscripted text analyzes clean.
#[derive(Default)]
pub(crate) struct ScriptedEngine {
    delay: Option<Duration>,
    results: Mutex<HashMap<String, Result<Vec<Issue>, String>>>,
    formatted: Mutex<Option<String>>,
    analyze_calls: AtomicUsize,
    last_settings: Mutex<Option<Value>>,
    last_range: Mutex<Option<EngineRange>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issues(self, text: &str, issues: Vec<Issue>) -> Self {
        self.results.lock().insert(text.to_string(), Ok(issues));
        self
    }

    pub fn with_failure(self, text: &str, message: &str) -> Self {
        self.results
            .lock()
            .insert(text.to_string(), Err(message.to_string()));
        self
    }

    /// Make each analysis take `delay` of (tokio) time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_formatted(self, text: &str) -> Self {
        *self.formatted.lock() = Some(text.to_string());
        self
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn last_settings(&self) -> Option<Value> {
        self.last_settings.lock().clone()
    }

    pub fn last_range(&self) -> Option<EngineRange> {
        *self.last_range.lock()
    }
}

impl AnalysisEngine for ScriptedEngine {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        settings: Option<&'a Value>,
    ) -> EngineFuture<'a, Vec<Issue>> {
        Box::pin(async move {
            self.analyze_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_settings.lock() = settings.cloned();
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.results.lock().get(text) {
                Some(Ok(issues)) => Ok(issues.clone()),
                Some(Err(message)) => Err(EngineError::Failed(message.clone())),
                None => Ok(Vec::new()),
            }
        })
    }

    fn format<'a>(
        &'a self,
        _text: &'a str,
        settings: &'a Value,
        range: Option<EngineRange>,
    ) -> EngineFuture<'a, Option<String>> {
        Box::pin(async move {
            *self.last_settings.lock() = Some(settings.clone());
            *self.last_range.lock() = range;
            Ok(self.formatted.lock().clone())
        })
    }
}

/// Hands out one shared engine and records every build.
pub(crate) struct CountingFactory {
    engine: Arc<ScriptedEngine>,
    builds: AtomicUsize,
    profiles: Mutex<Vec<RuleProfile>>,
    fail_next: AtomicBool,
}

impl CountingFactory {
    pub fn new(engine: Arc<ScriptedEngine>) -> Self {
        Self {
            engine,
            builds: AtomicUsize::new(0),
            profiles: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_profile(&self) -> Option<RuleProfile> {
        self.profiles.lock().last().cloned()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl EngineFactory for CountingFactory {
    fn build(&self, profile: &RuleProfile) -> Result<Arc<dyn AnalysisEngine>, EngineError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.profiles.lock().push(profile.clone());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Spawn("scripted failure".to_string()));
        }
        Ok(self.engine.clone())
    }
}

/// Keeps every publish in call order.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    published: Mutex<Vec<(String, Vec<Diagnostic>)>>,
}

impl RecordingPublisher {
    pub fn all(&self) -> Vec<(String, Vec<Diagnostic>)> {
        self.published.lock().clone()
    }

    pub fn for_uri(&self, uri: &str) -> Vec<Vec<Diagnostic>> {
        self.published
            .lock()
            .iter()
            .filter(|(u, _)| u == uri)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

impl DiagnosticsPublisher for RecordingPublisher {
    fn publish(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        self.published.lock().push((uri.to_string(), diagnostics));
    }
}
