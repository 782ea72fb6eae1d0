use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use profgate_core::error::{ValidationError, Violation};
use profgate_core::redact::describe_received;
use profgate_core::value::{ArgMap, ArgValue};
use profgate_core::{CrossFieldRule, GateError, PathFields, RuleTable, Schema};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToolKind {
    Register,
    List,
    Describe,
    BundleResolve,
    /// Handed to the `ToolBackend`; `bundle` names an argument expanded by
    /// the bundle resolver before dispatch.
    Backend { bundle: Option<&'static str> },
}

#[derive(Debug)]
pub(crate) struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub paths: PathFields,
    pub rules: Vec<CrossFieldRule>,
    pub kind: ToolKind,
}

const PROFILE_KINDS: [&str; 6] = ["cpu", "heap", "allocs", "mutex", "block", "goroutines"];

fn bundle_entry_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "handle": { "type": "string", "description": "Handle returned by an earlier call" },
            "kind": {
                "type": "string",
                "description": "Overrides the kind recorded for the handle"
            }
        },
        "required": ["handle"],
        "additionalProperties": false
    })
}

pub(crate) fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "artifact_register",
            description: "Register an existing profile file inside the base directory \
                and return a handle for it.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "File path relative to the base directory"
                    },
                    "service": { "type": "string" },
                    "environment": { "type": "string" },
                    "kind": {
                        "type": "string",
                        "description": "cpu, heap, mutex, goroutines, ..."
                    },
                    "timestamp": { "type": "string", "description": "RFC 3339; defaults to now" },
                    "profile_id": { "type": "string" },
                    "event_id": { "type": "string" }
                },
                "required": ["path", "service", "environment"],
                "additionalProperties": false
            }),
            paths: PathFields::single(&["path"]),
            rules: vec![CrossFieldRule::RequiresTogether("profile_id", "event_id")],
            kind: ToolKind::Register,
        },
        ToolDefinition {
            name: "artifacts_list",
            description: "List registered artifacts and their handles in registration order.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "service": { "type": "string" },
                    "environment": { "type": "string" },
                    "kind": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 500, "default": 100 }
                },
                "additionalProperties": false
            }),
            paths: PathFields::NONE,
            rules: Vec::new(),
            kind: ToolKind::List,
        },
        ToolDefinition {
            name: "artifact_describe",
            description: "Show the metadata, sandboxed path and bundle siblings of one handle.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "handle": { "type": "string" }
                },
                "required": ["handle"],
                "additionalProperties": false
            }),
            paths: PathFields::NONE,
            rules: Vec::new(),
            kind: ToolKind::Describe,
        },
        ToolDefinition {
            name: "bundle_resolve",
            description: "Expand a handle (or an explicit list of handles) \
                into a kind to path map.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "handle": {
                        "type": "string",
                        "description": "Anchor handle; brings in every artifact of its download"
                    },
                    "artifacts": {
                        "type": "array",
                        "items": bundle_entry_schema(),
                        "minItems": 1
                    }
                },
                "additionalProperties": false
            }),
            paths: PathFields::NONE,
            rules: vec![CrossFieldRule::ExactlyOneOf(&["handle", "artifacts"])],
            kind: ToolKind::BundleResolve,
        },
        ToolDefinition {
            name: "profiles_download",
            description: "Download profiles for a service from the profiling provider \
                into the base directory.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "service": { "type": "string" },
                    "environment": { "type": "string" },
                    "kinds": {
                        "type": "array",
                        "items": { "type": "string", "enum": PROFILE_KINDS },
                        "minItems": 1
                    },
                    "profile_id": { "type": "string" },
                    "event_id": { "type": "string" },
                    "from": { "type": "string", "description": "RFC 3339 window start" },
                    "to": { "type": "string", "description": "RFC 3339 window end" },
                    "output_dir": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 50, "default": 1 }
                },
                "required": ["service", "environment"],
                "additionalProperties": false
            }),
            paths: PathFields::single(&["output_dir"]),
            rules: vec![
                CrossFieldRule::RequiresTogether("profile_id", "event_id"),
                CrossFieldRule::RequiresTogether("from", "to"),
                CrossFieldRule::Custom {
                    name: "ordered_window",
                    check: ordered_window,
                },
            ],
            kind: ToolKind::Backend { bundle: None },
        },
        ToolDefinition {
            name: "pprof_top",
            description: "Top functions of a profile, optionally focused on one symbol.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "profile": { "type": "string", "description": "Path or handle" },
                    "mode": {
                        "type": "string",
                        "enum": ["summary", "focus"],
                        "default": "summary"
                    },
                    "focus": { "type": "string", "description": "Regex passed to pprof -focus" },
                    "sort": { "type": "string", "enum": ["flat", "cum"], "default": "flat" },
                    "nodecount": { "type": "integer", "minimum": 1, "maximum": 500, "default": 25 }
                },
                "required": ["profile"],
                "additionalProperties": false
            }),
            paths: PathFields::single(&["profile"]),
            rules: vec![CrossFieldRule::RequiredWhen {
                field: "mode",
                equals: "focus",
                requires: "focus",
            }],
            kind: ToolKind::Backend { bundle: None },
        },
        ToolDefinition {
            name: "pprof_diff",
            description: "Compare two or more profiles; the first is the base.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "profiles": {
                        "type": ["string", "array"],
                        "items": { "type": "string" },
                        "minItems": 2,
                        "description": "Paths or handles, base first"
                    },
                    "nodecount": { "type": "integer", "minimum": 1, "maximum": 500, "default": 25 }
                },
                "required": ["profiles"],
                "additionalProperties": false
            }),
            paths: PathFields::lists(&["profiles"]),
            rules: Vec::new(),
            kind: ToolKind::Backend { bundle: None },
        },
        ToolDefinition {
            name: "flamegraph_render",
            description: "Render a profile as an SVG flame graph.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "profile": { "type": "string", "description": "Path or handle" },
                    "output": { "type": "string", "description": "SVG path to write" },
                    "title": { "type": "string" },
                    "width": { "type": "integer", "minimum": 200, "maximum": 4000, "default": 1200 }
                },
                "required": ["profile", "output"],
                "additionalProperties": false
            }),
            paths: PathFields::single(&["profile", "output"]),
            rules: Vec::new(),
            kind: ToolKind::Backend { bundle: None },
        },
        ToolDefinition {
            name: "baseline_check",
            description: "Check profile metrics against fixed bounds.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "profile": { "type": "string", "description": "Path or handle" },
                    "checks": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "metric": { "type": "string" },
                                "min": { "type": "number" },
                                "max": { "type": "number" }
                            },
                            "required": ["metric"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["profile", "checks"],
                "additionalProperties": false
            }),
            paths: PathFields::single(&["profile"]),
            rules: vec![CrossFieldRule::Custom {
                name: "bounded_checks",
                check: bounded_checks,
            }],
            kind: ToolKind::Backend { bundle: None },
        },
        ToolDefinition {
            name: "bundle_analyze",
            description: "Analyze every profile of one download together (e.g. CPU and heap).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "bundle": {
                        "type": ["string", "array"],
                        "items": bundle_entry_schema(),
                        "minItems": 1,
                        "description": "Anchor handle, or explicit {handle, kind} entries"
                    },
                    "nodecount": { "type": "integer", "minimum": 1, "maximum": 500, "default": 25 }
                },
                "required": ["bundle"],
                "additionalProperties": false
            }),
            paths: PathFields::NONE,
            rules: Vec::new(),
            kind: ToolKind::Backend {
                bundle: Some("bundle"),
            },
        },
    ]
}

fn parse_instant(
    args: &ArgMap,
    field: &str,
) -> Result<Option<DateTime<FixedOffset>>, ValidationError> {
    let Some(value) = args.get(field) else {
        return Ok(None);
    };
    let Some(text) = value.as_str() else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(text).map(Some).map_err(|_| {
        ValidationError::new(
            Violation::Malformed,
            field,
            format!("'{field}' must be an RFC 3339 timestamp"),
            "RFC 3339 timestamp, e.g. 2024-01-01T00:00:00Z",
            describe_received(field, value),
        )
    })
}

fn ordered_window(args: &ArgMap) -> Result<(), ValidationError> {
    let from = parse_instant(args, "from")?;
    let to = parse_instant(args, "to")?;
    match (from, to) {
        (Some(from), Some(to)) if from >= to => Err(ValidationError::new(
            Violation::Conditional,
            "to",
            "'to' must be after 'from'",
            format!("a timestamp after {}", from.to_rfc3339()),
            describe_received("to", &ArgValue::String(to.to_rfc3339())),
        )
        .with_hint("Swap 'from' and 'to', or widen the window.")),
        _ => Ok(()),
    }
}

fn bounded_checks(args: &ArgMap) -> Result<(), ValidationError> {
    let Some(checks) = args.get("checks").and_then(ArgValue::as_array) else {
        return Ok(());
    };
    for (index, check) in checks.iter().enumerate() {
        let Some(check) = check.as_object() else {
            continue;
        };
        let min = check.get("min").and_then(ArgValue::as_f64);
        let max = check.get("max").and_then(ArgValue::as_f64);
        match (min, max) {
            (None, None) => {
                let field = format!("checks[{index}]");
                return Err(ValidationError::new(
                    Violation::Conditional,
                    field.clone(),
                    format!("'{field}' needs 'min', 'max', or both"),
                    "an object with 'min' and/or 'max'",
                    describe_received(&field, &ArgValue::Object(check.clone())),
                )
                .with_hint("A check without bounds can never fail; add 'min' or 'max'."));
            }
            (Some(min), Some(max)) if min > max => {
                let field = format!("checks[{index}].max");
                return Err(ValidationError::new(
                    Violation::Conditional,
                    field.clone(),
                    format!("'{field}' must not be below 'checks[{index}].min'"),
                    format!("a number >= {min}"),
                    describe_received(&field, &ArgValue::from_json(&json!(max))),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

pub(crate) struct CatalogEntry {
    pub definition: ToolDefinition,
    pub schema: Schema,
}

/// Tool definitions with their schemas compiled. Fixed after startup.
pub(crate) struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolCatalog {
    /// Compile every schema and collect the per-tool rules for the gate.
    pub fn build(definitions: Vec<ToolDefinition>) -> Result<(Self, RuleTable), GateError> {
        let mut rules = RuleTable::new();
        let mut entries = Vec::with_capacity(definitions.len());
        let mut by_name = HashMap::with_capacity(definitions.len());
        for mut definition in definitions {
            let schema = Schema::compile_root(&definition.input_schema).map_err(|err| {
                GateError::configuration(format!("tool '{}': {err}", definition.name))
            })?;
            rules.insert(definition.name, std::mem::take(&mut definition.rules));
            by_name.insert(definition.name, entries.len());
            entries.push(CatalogEntry { definition, schema });
        }
        Ok((Self { entries, by_name }, rules))
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).map(|index| &self.entries[*index])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .map(|entry| entry.definition.name)
            .collect()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}
