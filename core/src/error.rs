use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::redact;

/// Machine-readable error tags returned to callers.
pub mod codes {
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const UNKNOWN_HANDLE: &str = "unknown_handle";
    pub const PATH_ESCAPE: &str = "path_escape";
    pub const INVALID_CONFIGURATION: &str = "invalid_configuration";
}

/// What kind of rule a [`ValidationError`] reports. The union logic in the
/// validator needs to tell plain type mismatches apart from everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    MissingRequired,
    UnknownArgument,
    NullValue,
    TypeMismatch,
    NotInEnum,
    BelowMinimum,
    ExceedsMaximum,
    TooFewItems,
    Conditional,
    Malformed,
}

/// A single argument violation. Exactly one is produced per rejected call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub violation: Violation,
    /// Dot/bracket path, e.g. `checks[2].max`.
    pub field: String,
    pub message: String,
    pub expected: String,
    /// Already redacted and truncated.
    pub received: String,
    pub hint: Option<String>,
}

impl ValidationError {
    pub fn new(
        violation: Violation,
        field: impl Into<String>,
        message: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            violation,
            field: field.into(),
            message: message.into(),
            expected: expected.into(),
            received: received.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_type_mismatch(&self) -> bool {
        self.violation == Violation::TypeMismatch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateErrorKind {
    InvalidArgument,
    UnknownHandle,
    PathEscape,
    InvalidConfiguration,
}

impl GateErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GateErrorKind::InvalidArgument => codes::INVALID_ARGUMENT,
            GateErrorKind::UnknownHandle => codes::UNKNOWN_HANDLE,
            GateErrorKind::PathEscape => codes::PATH_ESCAPE,
            GateErrorKind::InvalidConfiguration => codes::INVALID_CONFIGURATION,
        }
    }
}

impl fmt::Display for GateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way the gate can refuse a call. All variants are deterministic
/// functions of input and configuration, so none are retried.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    #[error("{0}")]
    InvalidArgument(ValidationError),

    #[error("unknown handle supplied for '{field}'")]
    UnknownHandle { field: String, handle: String },

    #[error(
        "path {} is outside base directory {}",
        redact::describe_text(field, input),
        base.display()
    )]
    PathEscape {
        field: String,
        base: PathBuf,
        input: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        field: Option<String>,
        message: String,
    },
}

impl From<ValidationError> for GateError {
    fn from(err: ValidationError) -> Self {
        GateError::InvalidArgument(err)
    }
}

impl GateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        GateError::InvalidConfiguration {
            field: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> GateErrorKind {
        match self {
            GateError::InvalidArgument(_) => GateErrorKind::InvalidArgument,
            GateError::UnknownHandle { .. } => GateErrorKind::UnknownHandle,
            GateError::PathEscape { .. } => GateErrorKind::PathEscape,
            GateError::InvalidConfiguration { .. } => GateErrorKind::InvalidConfiguration,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            GateError::InvalidArgument(err) => Some(err.field.as_str()),
            GateError::UnknownHandle { field, .. } | GateError::PathEscape { field, .. } => {
                Some(field.as_str())
            }
            GateError::InvalidConfiguration { field, .. } => field.as_deref(),
        }
        .filter(|field| !field.is_empty())
    }

    /// Attach the argument path the failure belongs to. Components below the
    /// gate (sandbox, registry) do not know which field they were called for.
    pub fn at_field(self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self {
            GateError::InvalidArgument(mut err) => {
                err.field = name;
                GateError::InvalidArgument(err)
            }
            GateError::UnknownHandle { handle, .. } => {
                GateError::UnknownHandle { field: name, handle }
            }
            GateError::PathEscape { base, input, .. } => GateError::PathEscape {
                field: name,
                base,
                input,
            },
            GateError::InvalidConfiguration { message, .. } => GateError::InvalidConfiguration {
                field: Some(name),
                message,
            },
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let field = self.field().map(str::to_string);
        let tag = self.kind().as_str().to_string();
        match self {
            GateError::InvalidArgument(err) => ErrorPayload {
                error: tag,
                message: err.message.clone(),
                field,
                expected: Some(err.expected.clone()),
                received: Some(err.received.clone()),
                docs_hint: err.hint.clone(),
            },
            GateError::UnknownHandle { field: name, handle } => ErrorPayload {
                error: tag,
                message: self.to_string(),
                field,
                expected: Some(
                    "a handle returned by an earlier call in this session".to_string(),
                ),
                received: Some(redact::describe_text(name, handle)),
                docs_hint: Some(
                    "Handles are only valid for the server process that issued them. \
                     Re-run the producing tool or call artifacts_list to obtain a current handle."
                        .to_string(),
                ),
            },
            GateError::PathEscape { field: name, input, .. } => ErrorPayload {
                error: tag,
                message: self.to_string(),
                field,
                expected: Some("a path inside the configured base directory".to_string()),
                received: Some(redact::describe_text(name, input)),
                docs_hint: Some(
                    "Use a path relative to the base directory, or a handle from an earlier call."
                        .to_string(),
                ),
            },
            GateError::InvalidConfiguration { message, .. } => ErrorPayload {
                error: tag,
                message: message.clone(),
                field,
                expected: None,
                received: None,
                docs_hint: Some(
                    "The server's base directory could not be resolved. \
                     Ask the operator to fix it; changing arguments will not help."
                        .to_string(),
                ),
            },
        }
    }
}

/// Structured error object handed back to the caller. Written for agents,
/// not humans. Enough to understand what went wrong and how to fix it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    /// One of the tags in [`codes`].
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Redacted/truncated rendering of what the caller sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_omits_absent_members() {
        let err = GateError::configuration("base directory does not exist");
        let value = serde_json::to_value(err.to_payload()).unwrap();
        assert_eq!(value["error"], "invalid_configuration");
        assert!(value.get("field").is_none());
        assert!(value.get("received").is_none());
    }

    #[test]
    fn at_field_relabels_every_variant() {
        let escape = GateError::PathEscape {
            field: String::new(),
            base: PathBuf::from("/sandbox"),
            input: "../etc".to_string(),
        }
        .at_field("profiles[1]");
        assert_eq!(escape.field(), Some("profiles[1]"));
        assert_eq!(escape.kind(), GateErrorKind::PathEscape);

        let config = GateError::configuration("boom").at_field("output");
        assert_eq!(config.field(), Some("output"));
    }

    #[test]
    fn path_escape_payload_redacts_credential_fields() {
        let err = GateError::PathEscape {
            field: "token_file".to_string(),
            base: PathBuf::from("/sandbox"),
            input: "/etc/shadow".to_string(),
        };
        let payload = err.to_payload();
        assert_eq!(payload.received.as_deref(), Some(redact::REDACTED));
        assert!(!payload.message.contains("/etc/shadow"));
        assert!(payload.message.contains("/sandbox"));
        assert_eq!(payload.error, codes::PATH_ESCAPE);
    }
}
