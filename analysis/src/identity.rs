//! Issue identity — the key that correlates a published diagnostic with its fix.
//!
//! The transport does not round-trip opaque engine data, so a client asking
//! "what can fix this?" only has the diagnostic it was shown. The key is
//! derived from exactly the fields a [`Diagnostic`] carries on the wire.

use std::fmt::Write;

use crate::types::Diagnostic;

/// Placeholder for a missing source or rule code.
const MISSING: &str = "?";

/// Derive the stable key `{source}_{code}_{severity}_{sl}:{sc}-{el}:{ec}`.
#[must_use]
pub fn identity(diagnostic: &Diagnostic) -> String {
    let range = diagnostic.range();
    let mut id = String::with_capacity(64);
    let _ = write!(
        id,
        "{}_{}_{}_{}:{}-{}:{}",
        diagnostic.source().unwrap_or(MISSING),
        diagnostic.code().unwrap_or(MISSING),
        diagnostic.severity(),
        range.start.line,
        range.start.character,
        range.end.line,
        range.end.character,
    );
    id
}
