//! LSP message serde types for publishing diagnostics, plus URI helpers.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::{Diagnostic, Range};

pub const PUBLISH_DIAGNOSTICS_METHOD: &str = "textDocument/publishDiagnostics";

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PublishDiagnosticsParams<'a> {
    pub uri: &'a str,
    pub diagnostics: Vec<LspDiagnostic<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LspDiagnostic<'a> {
    pub range: Range,
    pub severity: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
    pub message: &'a str,
}

impl<'a> From<&'a Diagnostic> for LspDiagnostic<'a> {
    fn from(diagnostic: &'a Diagnostic) -> Self {
        Self {
            range: diagnostic.range(),
            severity: diagnostic.severity().to_lsp(),
            code: diagnostic.code(),
            source: diagnostic.source(),
            message: diagnostic.message(),
        }
    }
}

/// Build the `textDocument/publishDiagnostics` notification frame.
pub(crate) fn publish_diagnostics_notification(
    uri: &str,
    diagnostics: &[Diagnostic],
) -> serde_json::Result<serde_json::Value> {
    let params = PublishDiagnosticsParams {
        uri,
        diagnostics: diagnostics.iter().map(LspDiagnostic::from).collect(),
    };
    let notification = Notification::new(
        PUBLISH_DIAGNOSTICS_METHOD,
        Some(serde_json::to_value(&params)?),
    );
    serde_json::to_value(&notification)
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}

/// Undo percent-encoding of a drive colon (`file:///c%3A/x` → `file:///c:/x`).
///
/// Some Windows clients send the escaped form in requests after having been
/// published the unescaped one; both must address the same table entry.
#[must_use]
pub fn normalize_document_uri(uri: &str) -> Cow<'_, str> {
    let Some(rest) = uri.strip_prefix("file:///") else {
        return Cow::Borrowed(uri);
    };
    let drive_is_letter = rest.as_bytes().first().is_some_and(u8::is_ascii_alphabetic);
    let escaped_colon = rest
        .get(1..4)
        .is_some_and(|s| s.eq_ignore_ascii_case("%3a"));
    if drive_is_letter && escaped_colon {
        Cow::Owned(format!("file:///{}:{}", &rest[..1], &rest[4..]))
    } else {
        Cow::Borrowed(uri)
    }
}
