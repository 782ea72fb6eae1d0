use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use profgate_core::error::{ValidationError, Violation, codes};
use profgate_core::redact::describe_received;
use profgate_core::value::{ArgMap, ArgValue, optional_str};
use profgate_core::{ArtifactMetadata, GateError, RegisteredArtifact, RequestGate};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::backend::{ToolBackend, ToolInvocation};
use crate::{CallFailure, ToolError};

const LIST_DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Running,
    Committed,
    Abandoned,
}

/// Shared between a call's worker and the caller waiting on it. Registry
/// writes happen inside [`CallState::commit`], so a call the caller gave up
/// on never leaves handles behind.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallState(Arc<Mutex<Phase>>);

impl CallState {
    /// Returns `false` when the worker already committed; its result is
    /// then the one to report.
    pub(crate) fn abandon(&self) -> bool {
        let mut phase = self.0.lock().unwrap_or_else(|e| e.into_inner());
        match *phase {
            Phase::Committed => false,
            Phase::Running | Phase::Abandoned => {
                *phase = Phase::Abandoned;
                true
            }
        }
    }

    fn commit<T>(&self, tool: &str, apply: impl FnOnce() -> T) -> Result<T, ToolError> {
        let mut phase = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if *phase == Phase::Abandoned {
            warn!(tool, "call abandoned after timeout; results discarded");
            return Err(ToolError::new(
                "call_timeout",
                format!("'{tool}' finished after its deadline"),
            ));
        }
        *phase = Phase::Committed;
        Ok(apply())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|err| {
        ToolError::new(
            "internal_error",
            format!("failed to serialize tool output: {err}"),
        )
    })
}

fn entry_value(entry: &RegisteredArtifact) -> Result<Value, ToolError> {
    Ok(json!({
        "handle": entry.handle,
        "registered_at": entry.registered_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "artifact": to_json(&entry.metadata)?
    }))
}

fn owned(args: &ArgMap, key: &str) -> Option<String> {
    optional_str(args, key).map(str::to_string)
}

pub(crate) fn register_artifact(
    gate: &RequestGate,
    state: &CallState,
    args: &ArgMap,
) -> Result<Value, CallFailure> {
    let raw = optional_str(args, "path").ok_or_else(|| {
        ToolError::new(codes::INVALID_ARGUMENT, "'path' must not be empty").with_field("path")
    })?;
    let path = std::path::absolute(Path::new(raw)).map_err(|err| {
        ToolError::new(
            "artifact_not_found",
            format!("'path' cannot be made absolute: {err}"),
        )
        .with_field("path")
    })?;
    let stat = fs::metadata(&path).map_err(|err| {
        ToolError::new(
            "artifact_not_found",
            format!("'path' cannot be read: {err}"),
        )
        .with_field("path")
        .with_docs_hint("Register files that exist inside the base directory.")
    })?;
    if !stat.is_file() {
        return Err(ToolError::new("not_a_file", "'path' must name a regular file")
            .with_field("path")
            .into());
    }

    let metadata = ArtifactMetadata {
        service: owned(args, "service").unwrap_or_default(),
        environment: owned(args, "environment").unwrap_or_default(),
        kind: owned(args, "kind").unwrap_or_default(),
        timestamp: owned(args, "timestamp")
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        profile_id: owned(args, "profile_id"),
        event_id: owned(args, "event_id"),
        path,
        size_bytes: stat.len(),
    };
    let artifact = to_json(&metadata)?;
    let handle = state.commit("artifact_register", || gate.registry().register(metadata))?;
    Ok(json!({ "handle": handle, "artifact": artifact }))
}

pub(crate) fn list_artifacts(gate: &RequestGate, args: &ArgMap) -> Result<Value, CallFailure> {
    let service = optional_str(args, "service");
    let environment = optional_str(args, "environment");
    let kind = optional_str(args, "kind");
    let limit = args
        .get("limit")
        .and_then(ArgValue::as_integer)
        .and_then(|limit| usize::try_from(limit).ok())
        .unwrap_or(LIST_DEFAULT_LIMIT);

    let matching: Vec<RegisteredArtifact> = gate
        .registry()
        .list()
        .into_iter()
        .filter(|entry| service.is_none_or(|s| entry.metadata.service == s))
        .filter(|entry| environment.is_none_or(|e| entry.metadata.environment == e))
        .filter(|entry| kind.is_none_or(|k| entry.metadata.kind == k))
        .collect();
    let artifacts = matching
        .iter()
        .take(limit)
        .map(entry_value)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "total": matching.len(),
        "returned": artifacts.len(),
        "artifacts": artifacts
    }))
}

pub(crate) fn describe_artifact(gate: &RequestGate, args: &ArgMap) -> Result<Value, CallFailure> {
    let token = optional_str(args, "handle").unwrap_or_default();
    if !gate.registry().is_handle(token) {
        let received = args.get("handle").cloned().unwrap_or(ArgValue::Null);
        return Err(GateError::from(
            ValidationError::new(
                Violation::Malformed,
                "handle",
                "'handle' must be a handle, not a path",
                "a handle returned by an earlier call",
                describe_received("handle", &received),
            )
            .with_hint("Call artifacts_list to see issued handles."),
        )
        .into());
    }

    let entry = gate.registry().lookup(token).ok_or_else(|| GateError::UnknownHandle {
        field: "handle".to_string(),
        handle: token.to_string(),
    })?;
    let path = gate.resolve_path("handle", token)?;
    let siblings: Vec<String> = gate
        .registry()
        .bundle_entries(token)
        .map_err(|err| err.at_field("handle"))?
        .into_iter()
        .filter(|sibling| sibling.handle != entry.handle)
        .map(|sibling| sibling.handle.to_string())
        .collect();

    let mut described = entry_value(&entry)?;
    described["path"] = Value::String(path.display().to_string());
    described["bundle"] = json!(siblings);
    Ok(described)
}

pub(crate) fn resolve_bundle(gate: &RequestGate, args: &ArgMap) -> Result<Value, CallFailure> {
    let (field, value) = ["handle", "artifacts"]
        .into_iter()
        .find_map(|field| {
            args.get(field)
                .filter(|value| !value.is_null())
                .map(|value| (field, value))
        })
        .ok_or_else(|| {
            ToolError::new(codes::INVALID_ARGUMENT, "pass 'handle' or 'artifacts'")
                .with_field("handle")
        })?;
    let bundle = gate.resolve_bundle(field, value)?;
    Ok(to_json(&bundle)?)
}

pub(crate) fn run_backend(
    gate: &RequestGate,
    state: &CallState,
    backend: &dyn ToolBackend,
    tool: &str,
    bundle_field: Option<&str>,
    args: ArgMap,
) -> Result<Value, CallFailure> {
    let bundle = match bundle_field {
        Some(field) => {
            let value = args.get(field).cloned().unwrap_or(ArgValue::Null);
            Some(gate.resolve_bundle(field, &value)?)
        }
        None => None,
    };
    let invocation = ToolInvocation {
        tool: tool.to_string(),
        args,
        bundle,
    };

    let output = backend.invoke(&invocation).map_err(|err| {
        let mut tool_error = ToolError::new(err.code, err.message);
        if let Some(hint) = err.docs_hint {
            tool_error = tool_error.with_docs_hint(hint);
        }
        tool_error
    })?;

    let produced: Vec<Value> = state.commit(tool, || {
        output
            .artifacts
            .into_iter()
            .map(|metadata| {
                let kind = metadata.kind.clone();
                let path = metadata.path.display().to_string();
                let size_bytes = metadata.size_bytes;
                let handle = gate.registry().register(metadata);
                json!({
                    "handle": handle,
                    "kind": kind,
                    "path": path,
                    "size_bytes": size_bytes
                })
            })
            .collect()
    })?;
    info!(tool, produced = produced.len(), "backend call complete");

    let mut data = json!({
        "result": output.data,
        "artifacts": produced
    });
    if let Some(bundle) = &invocation.bundle {
        data["bundle"] = to_json(bundle)?;
    }
    Ok(data)
}
