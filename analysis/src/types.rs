//! Public types shared by the engine, the scheduler and the transport.
//!
//! Engine output ([`Issue`]) uses 1-based positions exactly as the analyzer
//! reports them. Publishable output ([`Diagnostic`]) uses 0-based positions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity reported by the analysis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueLevel {
    Information,
    Warning,
    Error,
    ParseError,
}

/// Half-open region of a script, 1-based as produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceRange {
    #[must_use]
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

/// A single text replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub range: SourceRange,
    pub text: String,
}

/// Ordered replacements that resolve one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub edits: Vec<TextEdit>,
}

/// Raw analyzer finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub level: IssueLevel,
    pub rule_name: Option<String>,
    pub message: String,
    pub source: Option<String>,
    pub range: SourceRange,
    pub fix: Option<Fix>,
}

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl DiagnosticSeverity {
    /// Convert from LSP numeric severity (1=Error, 2=Warning, 3=Info, 4=Hint).
    ///
    /// Returns `None` for values outside the LSP-defined range.
    #[must_use]
    pub fn from_lsp(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::Warning),
            3 => Some(Self::Information),
            4 => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_lsp(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    /// Name used in issue identity keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Information => "Information",
            Self::Hint => "Hint",
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 0-based line/character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// 0-based range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range spanning the whole of `text`, used for full-document edits.
    #[must_use]
    pub fn covering(text: &str) -> Self {
        let mut line = 0u32;
        let mut last_line_start = 0usize;
        for (idx, ch) in text.char_indices() {
            if ch == '\n' {
                line += 1;
                last_line_start = idx + 1;
            }
        }
        let character = text[last_line_start..].encode_utf16().count() as u32;
        Self::new(Position::new(0, 0), Position::new(line, character))
    }
}

/// Publishable, 0-based form of an [`Issue`].
///
/// Fields are private so the fields consumed by issue identity cannot drift
/// from the ones published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    message: String,
    code: Option<String>,
    source: Option<String>,
    range: Range,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        message: String,
        code: Option<String>,
        source: Option<String>,
        range: Range,
    ) -> Self {
        Self {
            severity,
            message,
            code,
            source,
            range,
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rule code, if the engine reported one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    /// Format as `uri:line:col: severity: [code] message` (1-indexed for display).
    #[must_use]
    pub fn display_with_uri(&self, uri: &str) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            uri,
            self.range.start.line + 1,
            self.range.start.character + 1,
            self.severity,
            self.code.as_deref().unwrap_or("?"),
            self.message,
        )
    }
}

/// Range argument for engine formatting: 1-based
/// `[start_line, start_column, end_line, end_column]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRange(pub [u32; 4]);

impl EngineRange {
    /// Convert a 0-based editor range into the engine's 1-based form.
    #[must_use]
    pub fn from_range(range: Range) -> Self {
        Self([
            range.start.line + 1,
            range.start.character + 1,
            range.end.line + 1,
            range.end.character + 1,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lsp_known_values() {
        assert_eq!(
            DiagnosticSeverity::from_lsp(1),
            Some(DiagnosticSeverity::Error)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(2),
            Some(DiagnosticSeverity::Warning)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(3),
            Some(DiagnosticSeverity::Information)
        );
        assert_eq!(
            DiagnosticSeverity::from_lsp(4),
            Some(DiagnosticSeverity::Hint)
        );
        assert_eq!(DiagnosticSeverity::from_lsp(0), None);
        assert_eq!(DiagnosticSeverity::from_lsp(99), None);
    }

    #[test]
    fn test_severity_numbers_roundtrip() {
        for severity in [
            DiagnosticSeverity::Error,
            DiagnosticSeverity::Warning,
            DiagnosticSeverity::Information,
            DiagnosticSeverity::Hint,
        ] {
            assert_eq!(
                DiagnosticSeverity::from_lsp(u64::from(severity.to_lsp())),
                Some(severity)
            );
        }
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(DiagnosticSeverity::Warning.to_string(), "Warning");
        assert_eq!(DiagnosticSeverity::Information.to_string(), "Information");
        assert!(DiagnosticSeverity::Error.is_error());
        assert!(!DiagnosticSeverity::Hint.is_error());
    }

    #[test]
    fn test_display_with_uri() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Warning,
            "alias used".to_string(),
            Some("PSAvoidUsingCmdletAliases".to_string()),
            None,
            Range::new(Position::new(2, 0), Position::new(2, 3)),
        );
        assert_eq!(
            diag.display_with_uri("file:///a.ps1"),
            "file:///a.ps1:3:1: Warning: [PSAvoidUsingCmdletAliases] alias used"
        );
    }

    #[test]
    fn test_range_covering() {
        assert_eq!(
            Range::covering(""),
            Range::new(Position::new(0, 0), Position::new(0, 0))
        );
        assert_eq!(
            Range::covering("a\nbc"),
            Range::new(Position::new(0, 0), Position::new(1, 2))
        );
        assert_eq!(
            Range::covering("line\n"),
            Range::new(Position::new(0, 0), Position::new(1, 0))
        );
    }

    #[test]
    fn test_engine_range_is_one_based() {
        let range = Range::new(Position::new(0, 4), Position::new(2, 0));
        assert_eq!(EngineRange::from_range(range), EngineRange([1, 5, 3, 1]));
    }

    #[test]
    fn test_issue_deserializes_engine_json() {
        let issue: Issue = serde_json::from_value(serde_json::json!({
            "level": "Warning",
            "ruleName": "RuleX",
            "message": "bad",
            "source": null,
            "range": { "startLine": 3, "startColumn": 1, "endLine": 3, "endColumn": 10 },
            "fix": { "description": "fix it", "edits": [
                { "range": { "startLine": 3, "startColumn": 1, "endLine": 3, "endColumn": 10 }, "text": "good" }
            ] }
        }))
        .unwrap();
        assert_eq!(issue.level, IssueLevel::Warning);
        assert_eq!(issue.rule_name.as_deref(), Some("RuleX"));
        assert_eq!(issue.range, SourceRange::new(3, 1, 3, 10));
        assert_eq!(issue.fix.unwrap().edits[0].text, "good");
    }
}
