//! Debounced background script analysis with fixes correlated to published
//! diagnostics.

pub mod codec;
pub mod types;

pub(crate) mod diagnostics;
pub(crate) mod protocol;

mod corrections;
mod engine;
mod identity;
mod process;
mod publish;
mod scheduler;
mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use corrections::{CorrectionEntry, CorrectionMap, CorrectionTable, PublishHandle};
pub use diagnostics::map_severity;
pub use engine::{
    AnalysisEngine, DisabledEngine, EngineError, EngineFactory, EngineFuture, EngineManager,
    RuleProfile,
};
pub use identity::identity;
pub use process::{ProcessEngine, ProcessEngineFactory};
pub use protocol::{PUBLISH_DIAGNOSTICS_METHOD, PathToUriError, normalize_document_uri};
pub use publish::{DiagnosticsPublisher, FramedPublisher};
pub use scheduler::{AnalysisFailure, DiagnosticsScheduler};
pub use types::{
    Diagnostic, DiagnosticSeverity, EngineRange, Fix, Issue, IssueLevel, Position, Range,
    SourceRange, TextEdit,
};
pub use workspace::{LocalWorkspace, ScriptFile, Workspace};
