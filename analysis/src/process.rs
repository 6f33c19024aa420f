//! Out-of-process analysis engine.
//!
//! Each call spawns the configured command, writes one framed JSON request
//! to its stdin, closes stdin, and reads one framed JSON response from its
//! stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use vigil_config::EngineCommandConfig;

use crate::codec::{FrameReader, FrameWriter};
use crate::engine::{AnalysisEngine, EngineError, EngineFactory, EngineFuture, RuleProfile};
use crate::types::{EngineRange, Issue};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Method {
    Analyze,
    Format,
}

#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    method: Method,
    profile: &'a RuleProfile,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<EngineRange>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct FormatResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Builds [`ProcessEngine`]s for a configured command.
///
/// The command is resolved against `PATH` once, at construction.
#[derive(Debug, Clone)]
pub struct ProcessEngineFactory {
    program: PathBuf,
    config: EngineCommandConfig,
}

impl ProcessEngineFactory {
    pub fn new(config: EngineCommandConfig) -> Result<Self, EngineError> {
        let program = which::which(&config.command).map_err(|e| {
            EngineError::Spawn(format!("{} not found in PATH: {e}", config.command))
        })?;
        tracing::debug!(program = %program.display(), "Resolved analysis engine command");
        Ok(Self { program, config })
    }
}

impl EngineFactory for ProcessEngineFactory {
    fn build(&self, profile: &RuleProfile) -> Result<Arc<dyn AnalysisEngine>, EngineError> {
        Ok(Arc::new(ProcessEngine {
            program: self.program.clone(),
            args: self.config.args.clone(),
            profile: profile.clone(),
            timeout_secs: self.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        }))
    }
}

/// Engine backed by a child process per call.
#[derive(Debug)]
pub struct ProcessEngine {
    program: PathBuf,
    args: Vec<String>,
    profile: RuleProfile,
    timeout_secs: u64,
}

impl ProcessEngine {
    async fn call<T: DeserializeOwned>(
        &self,
        request: &EngineRequest<'_>,
    ) -> Result<T, EngineError> {
        let exchange = self.exchange(request);
        let response = tokio::time::timeout(Duration::from_secs(self.timeout_secs), exchange)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout_secs))??;
        parse_response(response)
    }

    async fn exchange(&self, request: &EngineRequest<'_>) -> Result<Value, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", self.program.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("no stdin from child".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Spawn("no stdout from child".to_string()))?;

        let mut writer = FrameWriter::new(stdin);
        writer
            .write_frame(request)
            .await
            .map_err(|e| EngineError::Protocol(format!("{e:#}")))?;
        // Closing stdin tells the engine the request is complete.
        drop(writer);

        FrameReader::new(stdout)
            .read_frame()
            .await
            .map_err(|e| EngineError::Protocol(format!("{e:#}")))?
            .ok_or_else(|| EngineError::Protocol("engine exited without a response".to_string()))
    }
}

impl AnalysisEngine for ProcessEngine {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        settings: Option<&'a Value>,
    ) -> EngineFuture<'a, Vec<Issue>> {
        Box::pin(async move {
            let request = EngineRequest {
                method: Method::Analyze,
                profile: &self.profile,
                text,
                settings,
                range: None,
            };
            let response: AnalyzeResponse = self.call(&request).await?;
            Ok(response.issues)
        })
    }

    fn format<'a>(
        &'a self,
        text: &'a str,
        settings: &'a Value,
        range: Option<EngineRange>,
    ) -> EngineFuture<'a, Option<String>> {
        Box::pin(async move {
            let request = EngineRequest {
                method: Method::Format,
                profile: &self.profile,
                text,
                settings: Some(settings),
                range,
            };
            let response: FormatResponse = self.call(&request).await?;
            Ok(response.text)
        })
    }
}

fn parse_response<T: DeserializeOwned>(response: Value) -> Result<T, EngineError> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown engine error");
        return Err(EngineError::Failed(message.to_string()));
    }
    serde_json::from_value(response).map_err(|e| EngineError::Protocol(e.to_string()))
}
