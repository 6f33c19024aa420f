//! Diagnostics scheduler — debounced, superseding background analysis.
//!
//! `submit` swaps in a new scheduling token and cancels the previous one.
//! The spawned batch waits out the debounce delay against its own token; if
//! it survives, it analyzes every file in the batch, publishes the results
//! and installs each file's fixes in the correction table. Cancellation is
//! only honored during the debounce wait.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use vigil_config::AnalysisConfig;

use crate::corrections::{CorrectionMap, CorrectionTable, PublishHandle, PublishSignal};
use crate::diagnostics::Publication;
use crate::engine::{AnalysisEngine, EngineError, EngineManager};
use crate::publish::DiagnosticsPublisher;
use crate::types::{EngineRange, Issue};
use crate::workspace::{ScriptFile, Workspace};

const COMMENT_HELP_RULE: &str = "PSProvideCommentHelp";

/// One file's contribution to a batch failed.
#[derive(Debug, thiserror::Error)]
#[error("analysis of {uri} failed: {error}")]
pub struct AnalysisFailure {
    pub uri: String,
    #[source]
    pub error: EngineError,
}

impl AnalysisFailure {
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.error.is_unavailable()
    }
}

/// Orchestrates analysis passes for open documents.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DiagnosticsScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    engines: EngineManager,
    workspace: Arc<dyn Workspace>,
    publisher: Arc<dyn DiagnosticsPublisher>,
    corrections: CorrectionTable,
    /// Token of the most recently submitted batch.
    current: ArcSwapOption<CancellationToken>,
    runtime: Handle,
}

impl DiagnosticsScheduler {
    /// Batches are spawned on `runtime`.
    pub fn new(
        engines: EngineManager,
        workspace: Arc<dyn Workspace>,
        publisher: Arc<dyn DiagnosticsPublisher>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                engines,
                workspace,
                publisher,
                corrections: CorrectionTable::new(),
                current: ArcSwapOption::empty(),
                runtime,
            }),
        }
    }

    #[must_use]
    pub fn engines(&self) -> &EngineManager {
        &self.inner.engines
    }

    #[must_use]
    pub fn corrections(&self) -> &CorrectionTable {
        &self.inner.corrections
    }

    /// Schedule analysis of `files`, superseding any batch still in its
    /// debounce wait. Returns immediately.
    ///
    /// The batch is also cancelled when `cancel` is.
    pub fn submit(&self, files: &[Arc<ScriptFile>], cancel: &CancellationToken) {
        let token = cancel.child_token();
        let enabled = self.inner.engines.is_enabled();

        // Pending handles go in before the batch exists so a concurrent
        // lookup never sees a completed handle while work is queued.
        let signal = if files.is_empty() || !enabled {
            None
        } else {
            let (signal, handle) = PublishHandle::pending();
            for file in files {
                self.inner
                    .corrections
                    .get_or_create(file.uri())
                    .set_pending_publish(handle.clone());
            }
            Some(signal)
        };

        if let Some(previous) = self.inner.current.swap(Some(Arc::new(token.clone()))) {
            previous.cancel();
        }

        let Some(signal) = signal else {
            if !enabled && !files.is_empty() {
                tracing::debug!(count = files.len(), "Script analysis disabled; not scheduling");
            }
            return;
        };

        let delay = self.inner.engines.config().delay();
        let inner = Arc::clone(&self.inner);
        let files = files.to_vec();
        tracing::debug!(count = files.len(), ?delay, "Scheduled script analysis");
        self.inner
            .runtime
            .spawn(async move { inner.run_batch(files, token, delay, signal).await });
    }

    /// Publish empty diagnostics for `file` and forget its fixes.
    pub fn clear(&self, file: &ScriptFile) {
        self.inner.clear(file);
    }

    /// Clear `file` and drop its correction entry.
    pub fn close(&self, file: &ScriptFile) {
        self.inner.clear(file);
        if self.inner.corrections.remove(file.uri()) {
            tracing::trace!(uri = file.uri(), "Evicted correction entry");
        }
    }

    /// Fixes from the latest pass for `uri`.
    ///
    /// Waits for the publish that was pending when called. `None` if the
    /// URI was never submitted or cleared, or has been closed.
    pub async fn lookup_corrections(&self, uri: &str) -> Option<Arc<CorrectionMap>> {
        let entry = self.inner.corrections.get(uri)?;
        entry.pending_publish().wait().await;
        Some(entry.corrections())
    }

    /// Format `text` directly, without debouncing. `None` if analysis is
    /// disabled or the engine fails.
    pub async fn format(
        &self,
        text: &str,
        settings: &Value,
        range: Option<EngineRange>,
    ) -> Option<String> {
        let engine = self.inner.engines.get_engine();
        match engine.format(text, settings, range).await {
            Ok(formatted) => formatted,
            Err(EngineError::Unavailable) => {
                tracing::debug!("Formatting skipped: script analysis unavailable");
                None
            }
            Err(e) => {
                tracing::warn!("Formatting failed: {e}");
                None
            }
        }
    }

    /// Rebuild the engine from `config` and clear every open file, so no
    /// issues from the previous rule set stay visible.
    pub fn on_configuration_changed(&self, config: AnalysisConfig) {
        self.inner.engines.update_config(config);
        let files = self.inner.workspace.open_files();
        tracing::info!(count = files.len(), "Analysis configuration changed");
        for file in &files {
            self.inner.clear(file);
        }
    }

    /// Generate comment-based help for a function definition.
    ///
    /// `placement` is where the help goes relative to the function
    /// (`"before"`, `"begin"` or `"end"`).
    pub async fn comment_help(
        &self,
        function_text: &str,
        placement: &str,
        block_comment: bool,
    ) -> Option<String> {
        let settings = comment_help_settings(placement, block_comment);
        let engine = self.inner.engines.get_engine();
        let issues = match engine.analyze(function_text, Some(&settings)).await {
            Ok(issues) => issues,
            Err(EngineError::Unavailable) => return None,
            Err(e) => {
                tracing::warn!("Comment help generation failed: {e}");
                return None;
            }
        };
        let fix = issues.into_iter().next()?.fix?;
        fix.edits.into_iter().next().map(|edit| edit.text)
    }

    /// Cancel whatever batch is still waiting to run.
    pub fn shutdown(&self) {
        if let Some(token) = self.inner.current.swap(None) {
            token.cancel();
        }
    }
}

impl SchedulerInner {
    async fn run_batch(
        self: Arc<Self>,
        files: Vec<Arc<ScriptFile>>,
        token: CancellationToken,
        delay: Duration,
        signal: PublishSignal,
    ) {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::trace!(count = files.len(), "Analysis batch superseded");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        // One engine for the whole batch, even if it is invalidated meanwhile.
        let engine = self.engines.get_engine();
        let results = join_all(files.iter().map(|file| analyze_file(&*engine, file))).await;

        let mut published = 0usize;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(issues) => {
                    if self.install(file, issues) {
                        published += 1;
                    }
                }
                Err(failure) if failure.is_unavailable() => {
                    tracing::debug!(uri = %failure.uri, "Script analysis unavailable");
                }
                Err(failure) => {
                    tracing::warn!(uri = %failure.uri, "{}", failure.error);
                }
            }
        }
        tracing::debug!(published, total = files.len(), "Analysis batch finished");
        signal.complete();
    }

    /// Store `issues` as the latest for `file`, rebuild its fixes and
    /// publish. Skipped if the file was closed while it was being analyzed.
    fn install(&self, file: &ScriptFile, issues: Vec<Issue>) -> bool {
        let Some(entry) = self.corrections.get(file.uri()) else {
            tracing::trace!(uri = file.uri(), "File closed during analysis");
            return false;
        };
        let publication = Publication::from_issues(&issues);
        file.set_issues(issues);
        entry.replace(publication.corrections);
        self.publisher.publish(file.uri(), publication.diagnostics);
        true
    }

    fn clear(&self, file: &ScriptFile) {
        file.set_issues(Vec::new());
        self.corrections.get_or_create(file.uri()).clear();
        self.publisher.publish(file.uri(), Vec::new());
    }
}

async fn analyze_file(
    engine: &dyn AnalysisEngine,
    file: &ScriptFile,
) -> Result<Vec<Issue>, AnalysisFailure> {
    engine
        .analyze(file.contents(), None)
        .await
        .map_err(|error| AnalysisFailure {
            uri: file.uri().to_string(),
            error,
        })
}

fn comment_help_settings(placement: &str, block_comment: bool) -> Value {
    json!({
        "Rules": {
            COMMENT_HELP_RULE: {
                "Enable": true,
                "ExportedOnly": false,
                "BlockComment": block_comment,
                "VSCodeSnippetCorrection": true,
                "Placement": placement,
            }
        }
    })
}
