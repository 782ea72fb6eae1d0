use profgate_core::{ArgMap, ArtifactMetadata, ResolvedBundle};
use serde_json::Value;
use thiserror::Error;

/// One admitted call. Every path field in `args` is already sandboxed.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: ArgMap,
    pub bundle: Option<ResolvedBundle>,
}

#[derive(Debug, Clone, Default)]
pub struct BackendOutput {
    pub data: Value,
    /// Files the backend produced; each is registered and handed back as a handle.
    pub artifacts: Vec<ArtifactMetadata>,
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
    pub docs_hint: Option<String>,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            docs_hint: None,
        }
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.docs_hint = Some(docs_hint.into());
        self
    }
}

/// Invoked from a blocking worker thread; implementations may shell out or
/// do synchronous I/O.
pub trait ToolBackend: Send + Sync {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<BackendOutput, BackendError>;
}

/// Default backend when no profiling collaborators are wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

impl ToolBackend for UnavailableBackend {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<BackendOutput, BackendError> {
        Err(BackendError::new(
            "backend_unavailable",
            format!(
                "no profiling backend is configured for '{}'",
                invocation.tool
            ),
        )
        .with_docs_hint(
            "Only the built-in artifact tools run here. Register files with artifact_register.",
        ))
    }
}
