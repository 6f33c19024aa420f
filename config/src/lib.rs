//! Configuration loading for vigil.
//!
//! ```toml
//! [analysis]
//! enable = true
//! settings_path = "PSScriptAnalyzerSettings.psd1"
//! delay_ms = 750
//!
//! [formatting]
//! open_brace_on_same_line = true
//!
//! [engine]
//! command = "vigil-engine"
//! args = ["--stdio"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "VIGIL_CONFIG";

/// Debounce window applied to analysis requests when `delay_ms` is unset.
pub const DEFAULT_ANALYSIS_DELAY: Duration = Duration::from_millis(750);

/// Rules enabled when no settings file resolves.
pub const DEFAULT_RULES: &[&str] = &[
    "PSAvoidAssignmentToAutomaticVariable",
    "PSUseToExportFieldsInManifest",
    "PSMisleadingBacktick",
    "PSAvoidUsingCmdletAliases",
    "PSUseApprovedVerbs",
    "PSAvoidUsingPlainTextForPassword",
    "PSReservedCmdletChar",
    "PSReservedParams",
    "PSShouldProcess",
    "PSMissingModuleManifestField",
    "PSAvoidDefaultValueSwitchParameter",
    "PSUseDeclaredVarsMoreThanAssignments",
    "PSPossibleIncorrectComparisonWithNull",
    "PSAvoidDefaultValueForMandatoryParameter",
    "PSPossibleIncorrectUsageOfRedirectionOperator",
];

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VigilConfig {
    pub analysis: Option<AnalysisConfig>,
    pub formatting: Option<FormattingConfig>,
    /// Out-of-process analysis engine.
    pub engine: Option<EngineCommandConfig>,
}

impl VigilConfig {
    /// Load the config file, if one exists.
    ///
    /// A missing file is not an error: callers fall back to defaults.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn analysis(&self) -> AnalysisConfig {
        self.analysis.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn formatting(&self) -> FormattingConfig {
        self.formatting.clone().unwrap_or_default()
    }
}

/// Script analysis settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalysisConfig {
    /// Whether analysis runs at all. Default: true.
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Rule settings file, relative to the workspace root or absolute.
    pub settings_path: Option<String>,
    /// Overrides [`DEFAULT_RULES`].
    pub default_rules: Option<Vec<String>>,
    /// Debounce window in milliseconds. Default: 750.
    pub delay_ms: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enable: true,
            settings_path: None,
            default_rules: None,
            delay_ms: None,
        }
    }
}

impl AnalysisConfig {
    /// Configuration with analysis turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enable: false,
            ..Self::default()
        }
    }

    /// Configured settings path, treating an empty string as unset.
    #[must_use]
    pub fn settings_path(&self) -> Option<&str> {
        self.settings_path.as_deref().filter(|p| !p.trim().is_empty())
    }

    /// Rules to enable when no settings file resolves.
    #[must_use]
    pub fn included_rules(&self) -> Vec<String> {
        match &self.default_rules {
            Some(rules) => rules.clone(),
            None => DEFAULT_RULES.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay_ms
            .map_or(DEFAULT_ANALYSIS_DELAY, Duration::from_millis)
    }
}

/// Code formatting preferences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormattingConfig {
    #[serde(default = "default_true")]
    pub open_brace_on_same_line: bool,
    #[serde(default = "default_true")]
    pub new_line_after_open_brace: bool,
    #[serde(default = "default_true")]
    pub new_line_after_close_brace: bool,
    #[serde(default = "default_true")]
    pub whitespace_before_open_brace: bool,
    #[serde(default = "default_true")]
    pub whitespace_before_open_paren: bool,
    #[serde(default = "default_true")]
    pub whitespace_around_operator: bool,
    #[serde(default = "default_true")]
    pub whitespace_after_separator: bool,
    #[serde(default = "default_true")]
    pub ignore_one_line_block: bool,
    #[serde(default = "default_true")]
    pub align_property_value_pairs: bool,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            open_brace_on_same_line: true,
            new_line_after_open_brace: true,
            new_line_after_close_brace: true,
            whitespace_before_open_brace: true,
            whitespace_before_open_paren: true,
            whitespace_around_operator: true,
            whitespace_after_separator: true,
            ignore_one_line_block: true,
            align_property_value_pairs: true,
        }
    }
}

impl FormattingConfig {
    /// Build the rule settings object the engine's formatter consumes.
    ///
    /// `tab_size` and `insert_spaces` come from the editor request, not the
    /// config file.
    #[must_use]
    pub fn engine_settings(&self, tab_size: u32, insert_spaces: bool) -> Value {
        json!({
            "IncludeRules": [
                "PSPlaceCloseBrace",
                "PSPlaceOpenBrace",
                "PSUseConsistentWhitespace",
                "PSUseConsistentIndentation",
                "PSAlignAssignmentStatement",
            ],
            "Rules": {
                "PSPlaceOpenBrace": {
                    "Enable": true,
                    "OnSameLine": self.open_brace_on_same_line,
                    "NewLineAfter": self.new_line_after_open_brace,
                    "IgnoreOneLineBlock": self.ignore_one_line_block,
                },
                "PSPlaceCloseBrace": {
                    "Enable": true,
                    "NewLineAfter": self.new_line_after_close_brace,
                    "IgnoreOneLineBlock": self.ignore_one_line_block,
                },
                "PSUseConsistentIndentation": {
                    "Enable": true,
                    "IndentationSize": tab_size,
                    "Kind": if insert_spaces { "space" } else { "tab" },
                },
                "PSUseConsistentWhitespace": {
                    "Enable": true,
                    "CheckOpenBrace": self.whitespace_before_open_brace,
                    "CheckOpenParen": self.whitespace_before_open_paren,
                    "CheckOperator": self.whitespace_around_operator,
                    "CheckSeparator": self.whitespace_after_separator,
                },
                "PSAlignAssignmentStatement": {
                    "Enable": true,
                    "CheckHashtable": self.align_property_value_pairs,
                },
            },
        })
    }
}

/// Command line of an out-of-process analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineCommandConfig {
    /// Executable name or path (e.g. "vigil-engine").
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: Option<u64>,
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".vigil").join("config.toml"))
}
