//! Vigil CLI - one-shot script analysis and formatting.
//!
//! ```text
//! vigil check <file>...           analyze files, write publishDiagnostics frames to stdout
//! vigil format [--tab-size N] [--tabs] <file>
//! vigil --help
//! ```
//!
//! Logs go to stderr; stdout carries protocol frames (`check`) or the
//! formatted script (`format`).

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{
    env, fs,
    io::{Write, stdout},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vigil_analysis::{
    Diagnostic, DiagnosticsPublisher, DiagnosticsScheduler, EngineManager, FramedPublisher,
    LocalWorkspace, ProcessEngineFactory, ScriptFile, Workspace,
};
use vigil_config::{VigilConfig, config_path};

const DEFAULT_TAB_SIZE: u32 = 4;

#[derive(Debug, Parser)]
#[command(name = "vigil", version)]
#[command(about = "Background PowerShell script analysis from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Analyze files and write publishDiagnostics frames to stdout
    Check {
        /// Script files to analyze
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Format a script and print the result to stdout
    Format {
        /// Spaces per indentation level
        #[arg(long, default_value_t = DEFAULT_TAB_SIZE)]
        tab_size: u32,
        /// Indent with tabs instead of spaces
        #[arg(long)]
        tabs: bool,
        /// Script file to format
        path: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_config() -> Result<VigilConfig> {
    let config = VigilConfig::load()?;
    if config.is_none() {
        tracing::debug!("No config file found; using defaults");
    }
    Ok(config.unwrap_or_default())
}

/// Wire up a scheduler over the configured engine command.
fn build_scheduler(
    config: &VigilConfig,
    workspace: Arc<LocalWorkspace>,
    publisher: Arc<dyn DiagnosticsPublisher>,
) -> Result<DiagnosticsScheduler> {
    let Some(engine) = config.engine.clone() else {
        let location = config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "the config file".to_string());
        bail!("no analysis engine configured; add an [engine] section to {location}");
    };
    let engines = EngineManager::new(
        Arc::new(ProcessEngineFactory::new(engine)?),
        workspace.clone(),
        config.analysis(),
    );
    Ok(DiagnosticsScheduler::new(
        engines,
        workspace,
        publisher,
        Handle::current(),
    ))
}

fn open_file(workspace: &LocalWorkspace, path: &Path) -> Result<Arc<ScriptFile>> {
    let path = path
        .canonicalize()
        .with_context(|| format!("resolving {}", path.display()))?;
    let contents =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let file = ScriptFile::from_path(&path, contents)?;
    Ok(workspace.open(file))
}

async fn check_files(config: &VigilConfig, paths: &[PathBuf]) -> Result<()> {
    let workspace = Arc::new(LocalWorkspace::new(env::current_dir()?));
    let publisher = Arc::new(FramedPublisher::spawn(tokio::io::stdout()));
    let scheduler = build_scheduler(config, workspace.clone(), publisher.clone())?;

    let files = paths
        .iter()
        .map(|path| open_file(&workspace, path))
        .collect::<Result<Vec<_>>>()?;

    scheduler.submit(&files, &CancellationToken::new());

    let mut issues = 0usize;
    let mut fixable = 0usize;
    for file in workspace.open_files() {
        let Some(corrections) = scheduler.lookup_corrections(file.uri()).await else {
            continue;
        };
        fixable += corrections.len();
        for issue in file.issues() {
            tracing::info!("{}", Diagnostic::from_issue(&issue).display_with_uri(file.uri()));
            issues += 1;
        }
    }

    if !scheduler.engines().is_enabled() {
        tracing::warn!("Script analysis is disabled by configuration");
    }
    tracing::info!(files = files.len(), issues, fixable, "Analysis complete");

    scheduler.shutdown();
    publisher.shutdown().await;
    Ok(())
}

async fn format_file(
    config: &VigilConfig,
    path: &Path,
    tab_size: u32,
    insert_spaces: bool,
) -> Result<()> {
    let workspace = Arc::new(LocalWorkspace::new(env::current_dir()?));
    let publisher = Arc::new(FramedPublisher::spawn(tokio::io::sink()));
    let scheduler = build_scheduler(config, workspace, publisher.clone())?;

    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let settings = config.formatting().engine_settings(tab_size, insert_spaces);
    let formatted = scheduler.format(&text, &settings, None).await;
    if formatted.is_none() {
        tracing::warn!(path = %path.display(), "Formatting unavailable; printing input unchanged");
    }

    {
        let mut out = stdout().lock();
        out.write_all(formatted.as_deref().unwrap_or(&text).as_bytes())?;
        out.flush()?;
    }

    publisher.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Check { files } => check_files(&load_config()?, &files).await,
        Command::Format {
            tab_size,
            tabs,
            path,
        } => format_file(&load_config()?, &path, tab_size, !tabs).await,
    }
}
