use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bundle::{BundleRequest, BundleResolver, ResolvedBundle};
use crate::error::{GateError, ValidationError, Violation};
use crate::handles::HandleRegistry;
use crate::redact::describe_received;
use crate::rules::RuleTable;
use crate::sandbox::PathSandbox;
use crate::schema::{Schema, SchemaValidator};
use crate::value::{ArgMap, ArgValue, args_from_json};

/// Argument names a tool marks as filesystem-referencing. Everything else
/// passes through the gate untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathFields {
    pub single: &'static [&'static str],
    pub lists: &'static [&'static str],
}

impl PathFields {
    pub const NONE: PathFields = PathFields {
        single: &[],
        lists: &[],
    };

    pub const fn single(names: &'static [&'static str]) -> Self {
        Self {
            single: names,
            lists: &[],
        }
    }

    pub const fn lists(names: &'static [&'static str]) -> Self {
        Self {
            single: &[],
            lists: names,
        }
    }
}

/// Validate, then resolve handles, then sandbox every path-bearing field.
pub struct RequestGate {
    registry: Arc<HandleRegistry>,
    sandbox: PathSandbox,
    validator: SchemaValidator,
}

impl RequestGate {
    pub fn new(registry: Arc<HandleRegistry>, sandbox: PathSandbox, rules: RuleTable) -> Self {
        Self {
            registry,
            sandbox,
            validator: SchemaValidator::new(rules),
        }
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    /// Full pipeline for one call. Nothing downstream sees the raw map.
    pub fn admit(
        &self,
        tool: &str,
        schema: &Schema,
        fields: &PathFields,
        raw: &Map<String, Value>,
    ) -> Result<ArgMap, GateError> {
        let args = args_from_json(raw);
        let outcome = self
            .validator
            .validate(schema, tool, &args)
            .map_err(GateError::from)
            .and_then(|()| self.sanitize(args, fields));
        match &outcome {
            Ok(_) => debug!(tool, "call admitted"),
            Err(err) => warn!(
                tool,
                kind = %err.kind(),
                field = err.field().unwrap_or_default(),
                "call rejected"
            ),
        }
        outcome
    }

    /// Replace every declared path field with its sandboxed form. Handle
    /// values are looked up first; an unknown handle is never treated as a
    /// literal path.
    pub fn sanitize(&self, mut args: ArgMap, fields: &PathFields) -> Result<ArgMap, GateError> {
        for &name in fields.single {
            let Some(value) = args.get(name) else {
                continue;
            };
            let cleaned = match value {
                ArgValue::Null => continue,
                ArgValue::String(raw) => ArgValue::String(self.resolve_path_text(name, raw)?),
                other => return Err(not_a_path(name, other)),
            };
            args.insert(name.to_string(), cleaned);
        }

        for &name in fields.lists {
            let Some(value) = args.get(name) else {
                continue;
            };
            let cleaned = match value {
                ArgValue::Null => continue,
                ArgValue::String(raw) => {
                    let element = format!("{name}[0]");
                    vec![ArgValue::String(self.resolve_path_text(&element, raw)?)]
                }
                ArgValue::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let element = format!("{name}[{index}]");
                        match item {
                            ArgValue::String(raw) => {
                                self.resolve_path_text(&element, raw).map(ArgValue::String)
                            }
                            other => Err(not_a_path(&element, other)),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => return Err(not_a_path(name, other)),
            };
            args.insert(name.to_string(), ArgValue::Array(cleaned));
        }

        Ok(args)
    }

    /// Handle-or-path to a contained path. Empty input stays empty.
    pub fn resolve_path(&self, field: &str, raw: &str) -> Result<PathBuf, GateError> {
        let literal;
        let candidate = if self.registry.is_handle(raw) {
            let metadata = self
                .registry
                .require(raw)
                .map_err(|err| err.at_field(field))?;
            debug!(field, handle = raw, "resolved handle");
            literal = metadata.path;
            path_text(field, &literal)?
        } else {
            raw
        };
        let resolved = self
            .sandbox
            .resolve(candidate)
            .map_err(|err| err.at_field(field))?;
        debug!(field, path = %resolved.display(), "path field sanitized");
        Ok(resolved)
    }

    fn resolve_path_text(&self, field: &str, raw: &str) -> Result<String, GateError> {
        let resolved = self.resolve_path(field, raw)?;
        path_text(field, &resolved).map(str::to_string)
    }

    pub fn resolve_bundle(
        &self,
        field: &str,
        value: &ArgValue,
    ) -> Result<ResolvedBundle, GateError> {
        let request = BundleRequest::from_arg(field, value)?;
        BundleResolver::new(&self.registry, &self.sandbox).resolve(field, &request)
    }
}

fn path_text<'a>(field: &str, path: &'a Path) -> Result<&'a str, GateError> {
    path.to_str().ok_or_else(|| {
        GateError::configuration(format!("path {} is not valid UTF-8", path.display()))
            .at_field(field)
    })
}

fn not_a_path(field: &str, value: &ArgValue) -> GateError {
    ValidationError::new(
        Violation::TypeMismatch,
        field,
        format!(
            "'{field}' must be a path string or handle, got {}",
            value.kind_label()
        ),
        "string",
        describe_received(field, value),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateErrorKind;
    use crate::handles::ArtifactMetadata;
    use crate::redact::REDACTED;
    use crate::rules::CrossFieldRule;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const TOP_FIELDS: PathFields = PathFields::single(&["profile"]);
    const DIFF_FIELDS: PathFields = PathFields::lists(&["profiles"]);

    struct Fixture {
        _dir: TempDir,
        canonical: PathBuf,
        gate: RequestGate,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let canonical = fs::canonicalize(dir.path()).unwrap();
        let rules = RuleTable::new().with_rules(
            "pprof_top",
            vec![CrossFieldRule::RequiredWhen {
                field: "mode",
                equals: "focus",
                requires: "focus",
            }],
        );
        let gate = RequestGate::new(
            Arc::new(HandleRegistry::new()),
            PathSandbox::new(Some(dir.path().to_path_buf())),
            rules,
        );
        Fixture {
            _dir: dir,
            canonical,
            gate,
        }
    }

    fn top_schema() -> Schema {
        Schema::compile_root(&json!({
            "type": "object",
            "properties": {
                "profile": {"type": "string"},
                "mode": {"type": "string", "enum": ["summary", "focus"]},
                "focus": {"type": "string"},
                "limit": {"type": "integer", "minimum": 1, "maximum": 200},
                "api_key": {"type": "string"}
            },
            "required": ["profile"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    fn diff_schema() -> Schema {
        Schema::compile_root(&json!({
            "type": "object",
            "properties": {
                "profiles": {
                    "type": ["string", "array"],
                    "items": {"type": "string"},
                    "minItems": 2
                }
            },
            "required": ["profiles"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn metadata(path: PathBuf) -> ArtifactMetadata {
        ArtifactMetadata {
            service: "api".to_string(),
            environment: "prod".to_string(),
            kind: "cpu".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            profile_id: None,
            event_id: None,
            path,
            size_bytes: 0,
        }
    }

    #[test]
    fn admitted_paths_are_canonical_and_other_fields_pass_through() {
        let f = fixture();
        let args = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({
                    "profile": "reports/../cpu.pprof",
                    "limit": 10,
                    "mode": "summary"
                })),
            )
            .unwrap();
        assert_eq!(
            args["profile"],
            ArgValue::String(f.canonical.join("cpu.pprof").to_string_lossy().into_owned())
        );
        assert_eq!(args["limit"].as_integer(), Some(10));
        assert_eq!(args["mode"].as_str(), Some("summary"));
    }

    #[test]
    fn handles_resolve_to_their_registered_path() {
        let f = fixture();
        let path = f.canonical.join("cpu.pprof");
        fs::write(&path, b"pprof").unwrap();
        let handle = f.gate.registry().register(metadata(path.clone()));
        let args = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": handle.as_str()})),
            )
            .unwrap();
        assert_eq!(args["profile"].as_str(), Some(path.to_str().unwrap()));
    }

    #[test]
    fn unknown_handle_never_falls_back_to_a_literal_path() {
        let f = fixture();
        let stranger = format!("pgh_{}", "f".repeat(32));
        fs::write(f.canonical.join(&stranger), b"decoy").unwrap();
        let err = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": stranger})),
            )
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::UnknownHandle);
        assert_eq!(err.field(), Some("profile"));

        let explicit = f
            .gate
            .sanitize(
                args_from_json(&raw(json!({"profile": format!("./{stranger}")}))),
                &TOP_FIELDS,
            )
            .unwrap();
        assert_eq!(
            explicit["profile"].as_str(),
            Some(f.canonical.join(&stranger).to_str().unwrap())
        );
    }

    #[test]
    fn handle_pointing_outside_the_sandbox_is_an_escape() {
        let f = fixture();
        let outside = TempDir::new().unwrap();
        let handle = f
            .gate
            .registry()
            .register(metadata(outside.path().join("cpu.pprof")));
        let err = f
            .gate
            .sanitize(
                args_from_json(&raw(json!({"profile": handle.as_str()}))),
                &TOP_FIELDS,
            )
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::PathEscape);
        assert_eq!(err.field(), Some("profile"));
    }

    #[test]
    fn path_list_errors_name_the_failing_element() {
        let f = fixture();
        let err = f
            .gate
            .admit(
                "pprof_diff",
                &diff_schema(),
                &DIFF_FIELDS,
                &raw(json!({
                    "profiles": ["a.pprof", "../../etc/passwd", "b.pprof"]
                })),
            )
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::PathEscape);
        assert_eq!(err.field(), Some("profiles[1]"));
    }

    #[test]
    fn bare_string_path_list_becomes_a_single_element_array() {
        let f = fixture();
        let args = f
            .gate
            .sanitize(
                args_from_json(&raw(json!({"profiles": "one.pprof"}))),
                &DIFF_FIELDS,
            )
            .unwrap();
        let items = args["profiles"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        let expected = f.canonical.join("one.pprof");
        assert_eq!(items[0].as_str(), expected.to_str());
    }

    #[test]
    fn single_string_for_min_two_list_reports_min_items() {
        let f = fixture();
        let err = f
            .gate
            .admit(
                "pprof_diff",
                &diff_schema(),
                &DIFF_FIELDS,
                &raw(json!({"profiles": "only-one.pprof"})),
            )
            .unwrap_err();
        match err {
            GateError::InvalidArgument(inner) => {
                assert_eq!(inner.violation, Violation::TooFewItems);
                assert_eq!(inner.field, "profiles");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validation_runs_before_any_path_resolution() {
        let f = fixture();
        let err = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": "/etc/passwd", "bogus": 1})),
            )
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::InvalidArgument);
        assert_eq!(err.field(), Some("bogus"));
    }

    #[test]
    fn cross_field_rules_run_after_the_schema_pass() {
        let f = fixture();
        let err = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": "cpu.pprof", "mode": "focus"})),
            )
            .unwrap_err();
        assert_eq!(err.field(), Some("focus"));
    }

    #[test]
    fn credential_fields_are_redacted_in_payloads() {
        let f = fixture();
        let err = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": "cpu.pprof", "api_key": 42})),
            )
            .unwrap_err();
        let payload = serde_json::to_string(&err.to_payload()).unwrap();
        assert!(payload.contains(REDACTED));
        assert!(!payload.contains("42"));

        let err = f
            .gate
            .admit(
                "pprof_top",
                &top_schema(),
                &TOP_FIELDS,
                &raw(json!({"profile": "cpu.pprof", "secret_token": "sk-abcdef"})),
            )
            .unwrap_err();
        assert_eq!(err.field(), Some("secret_token"));
        let payload = serde_json::to_string(&err.to_payload()).unwrap();
        assert!(!payload.contains("sk-abcdef"));
    }

    #[test]
    fn non_string_path_values_are_rejected() {
        let f = fixture();
        let err = f
            .gate
            .sanitize(args_from_json(&raw(json!({"profile": 7}))), &TOP_FIELDS)
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::InvalidArgument);
        assert_eq!(err.field(), Some("profile"));
    }

    #[test]
    fn disabled_sandbox_only_normalizes() {
        let gate = RequestGate::new(
            Arc::new(HandleRegistry::new()),
            PathSandbox::disabled(),
            RuleTable::new(),
        );
        let args = gate
            .sanitize(
                args_from_json(&raw(json!({"profile": "/tmp/./x/../cpu.pprof"}))),
                &TOP_FIELDS,
            )
            .unwrap();
        assert_eq!(args["profile"].as_str(), Some("/tmp/cpu.pprof"));
    }

    #[test]
    fn empty_path_values_stay_empty() {
        let f = fixture();
        let args = f
            .gate
            .sanitize(args_from_json(&raw(json!({"profile": ""}))), &TOP_FIELDS)
            .unwrap();
        assert_eq!(args["profile"].as_str(), Some(""));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_through_the_gate_is_rejected() {
        let f = fixture();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("passwd"), b"root").unwrap();
        std::os::unix::fs::symlink(outside.path(), f.canonical.join("link")).unwrap();
        let err = f
            .gate
            .sanitize(
                args_from_json(&raw(json!({"profile": "link/passwd"}))),
                &TOP_FIELDS,
            )
            .unwrap_err();
        assert_eq!(err.kind(), GateErrorKind::PathEscape);
    }
}
