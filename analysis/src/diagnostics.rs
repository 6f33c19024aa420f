//! Diagnostic construction — turns engine issues into publishable form.

use crate::corrections::CorrectionMap;
use crate::identity::identity;
use crate::types::{Diagnostic, DiagnosticSeverity, Issue, IssueLevel, Position, Range};

/// Map an engine level onto a transport severity.
///
/// Anything the transport has no exact counterpart for is reported as an
/// error so it is never hidden.
#[must_use]
pub fn map_severity(level: IssueLevel) -> DiagnosticSeverity {
    match level {
        IssueLevel::Information => DiagnosticSeverity::Information,
        IssueLevel::Warning => DiagnosticSeverity::Warning,
        IssueLevel::Error | IssueLevel::ParseError => DiagnosticSeverity::Error,
    }
}

impl Diagnostic {
    /// Build the 0-based diagnostic for a 1-based engine issue.
    #[must_use]
    pub fn from_issue(issue: &Issue) -> Self {
        let r = issue.range;
        Diagnostic::new(
            map_severity(issue.level),
            issue.message.clone(),
            issue.rule_name.clone(),
            issue.source.clone(),
            Range::new(
                Position::new(
                    r.start_line.saturating_sub(1),
                    r.start_column.saturating_sub(1),
                ),
                Position::new(r.end_line.saturating_sub(1), r.end_column.saturating_sub(1)),
            ),
        )
    }
}

/// Diagnostics for one file plus the fixes keyed by their identity.
///
/// Both halves are derived from the same [`Diagnostic`] values, so a client
/// holding a published diagnostic can always recompute the key.
#[derive(Debug, Default)]
pub(crate) struct Publication {
    pub diagnostics: Vec<Diagnostic>,
    pub corrections: CorrectionMap,
}

impl Publication {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut diagnostics = Vec::with_capacity(issues.len());
        let mut corrections = CorrectionMap::new();
        for issue in issues {
            let diagnostic = Diagnostic::from_issue(issue);
            if let Some(fix) = &issue.fix {
                corrections.insert(identity(&diagnostic), fix.clone());
            }
            diagnostics.push(diagnostic);
        }
        Self {
            diagnostics,
            corrections,
        }
    }
}
