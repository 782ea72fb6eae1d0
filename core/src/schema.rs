//! Declarative argument schemas and the recursive validator that walks them.
//!
//! Tool schemas are written as a JSON Schema subset (the same JSON that is
//! published to clients in `tools/list`) and compiled once at startup into a
//! [`Schema`] tree. Validation stops at the first violation. Required fields
//! are checked before unknown fields, and unknown fields before per-property
//! constraints. Within each phase names are visited in sorted order, so the
//! reported error is reproducible for a given input.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::error::{GateError, ValidationError, Violation};
use crate::redact::describe_received;
use crate::rules::RuleTable;
use crate::value::{ArgMap, ArgValue};

/// Similarity above which an unknown argument gets a "did you mean" hint.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Boolean,
    Integer,
    Number,
    Array,
    Object,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Number => "number",
            Kind::Array => "array",
            Kind::Object => "object",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Kind::String),
            "boolean" => Some(Kind::Boolean),
            "integer" => Some(Kind::Integer),
            "number" => Some(Kind::Number),
            "array" => Some(Kind::Array),
            "object" => Some(Kind::Object),
            _ => None,
        }
    }

    pub fn accepts(self, value: &ArgValue) -> bool {
        match self {
            Kind::String => matches!(value, ArgValue::String(_)),
            Kind::Boolean => matches!(value, ArgValue::Bool(_)),
            Kind::Integer => value.is_integer(),
            Kind::Number => matches!(value, ArgValue::Number(_)),
            Kind::Array => matches!(value, ArgValue::Array(_)),
            Kind::Object => matches!(value, ArgValue::Object(_)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive numeric bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, Schema>,
    pub required: BTreeSet<String>,
    pub deny_unknown: bool,
}

impl ObjectSchema {
    fn allowed_names(&self) -> String {
        self.properties
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One accepted kind plus the constraints that only make sense for it.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    String { allowed: Option<Vec<String>> },
    Boolean,
    Integer { bounds: Bounds },
    Number { bounds: Bounds },
    Array {
        items: Option<Box<Schema>>,
        min_items: Option<usize>,
    },
    Object(ObjectSchema),
}

impl SchemaNode {
    pub fn kind(&self) -> Kind {
        match self {
            SchemaNode::String { .. } => Kind::String,
            SchemaNode::Boolean => Kind::Boolean,
            SchemaNode::Integer { .. } => Kind::Integer,
            SchemaNode::Number { .. } => Kind::Number,
            SchemaNode::Array { .. } => Kind::Array,
            SchemaNode::Object(_) => Kind::Object,
        }
    }
}

/// A schema node accepting one or more kinds. More than one variant makes it
/// a union; declaration order only matters for which error gets reported.
#[derive(Debug, Clone)]
pub struct Schema {
    variants: Vec<SchemaNode>,
}

impl Schema {
    pub fn from_variants(variants: Vec<SchemaNode>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[SchemaNode] {
        &self.variants
    }

    pub fn kinds(&self) -> Vec<Kind> {
        self.variants.iter().map(SchemaNode::kind).collect()
    }

    pub fn object(&self) -> Option<&ObjectSchema> {
        self.variants.iter().find_map(|node| match node {
            SchemaNode::Object(object) => Some(object),
            _ => None,
        })
    }

    /// Human description used as the "expected" side of errors.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .variants
            .iter()
            .map(|node| match node {
                SchemaNode::String {
                    allowed: Some(allowed),
                } => format!("string (one of: {})", allowed.join(", ")),
                SchemaNode::Array {
                    min_items: Some(min),
                    ..
                } if *min > 0 => format!("array (at least {min} items)"),
                other => other.kind().to_string(),
            })
            .collect();
        parts.join(" or ")
    }

    /// Compile a tool's root schema. The root must accept an object.
    pub fn compile_root(raw: &Value) -> Result<Self, GateError> {
        let schema = Self::compile(raw)?;
        if schema.object().is_none() {
            return Err(GateError::configuration(
                "tool input schema must have type \"object\" at the root",
            ));
        }
        Ok(schema)
    }

    pub fn compile(raw: &Value) -> Result<Self, GateError> {
        compile_at(raw, "$")
    }
}

fn compile_at(raw: &Value, location: &str) -> Result<Schema, GateError> {
    let obj = raw.as_object().ok_or_else(|| {
        GateError::configuration(format!("schema at {location} must be a JSON object"))
    })?;

    let kind_names: Vec<&str> = match obj.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str().ok_or_else(|| {
                    GateError::configuration(format!(
                        "schema at {location} has a non-string entry in \"type\""
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(GateError::configuration(format!(
                "schema at {location} must declare \"type\""
            )));
        }
    };
    if kind_names.is_empty() {
        return Err(GateError::configuration(format!(
            "schema at {location} declares an empty \"type\" list"
        )));
    }

    let bounds = Bounds {
        minimum: obj.get("minimum").and_then(Value::as_f64),
        maximum: obj.get("maximum").and_then(Value::as_f64),
    };

    let mut variants = Vec::with_capacity(kind_names.len());
    for name in kind_names {
        let kind = Kind::from_name(name).ok_or_else(|| {
            GateError::configuration(format!("schema at {location} uses unknown type \"{name}\""))
        })?;
        let node = match kind {
            Kind::String => SchemaNode::String {
                allowed: compile_enum(obj.get("enum"), location)?,
            },
            Kind::Boolean => SchemaNode::Boolean,
            Kind::Integer => SchemaNode::Integer { bounds },
            Kind::Number => SchemaNode::Number { bounds },
            Kind::Array => SchemaNode::Array {
                items: match obj.get("items") {
                    Some(items) => Some(Box::new(compile_at(items, &format!("{location}.items"))?)),
                    None => None,
                },
                min_items: obj
                    .get("minItems")
                    .and_then(Value::as_u64)
                    .map(|min| min as usize),
            },
            Kind::Object => SchemaNode::Object(compile_object(obj, location)?),
        };
        variants.push(node);
    }
    Ok(Schema { variants })
}

fn compile_enum(raw: Option<&Value>, location: &str) -> Result<Option<Vec<String>>, GateError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let members = raw.as_array().ok_or_else(|| {
        GateError::configuration(format!("schema at {location} has a non-array \"enum\""))
    })?;
    members
        .iter()
        .map(|member| {
            member.as_str().map(str::to_string).ok_or_else(|| {
                GateError::configuration(format!(
                    "schema at {location} has a non-string \"enum\" member"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn compile_object(
    obj: &serde_json::Map<String, Value>,
    location: &str,
) -> Result<ObjectSchema, GateError> {
    let mut properties = BTreeMap::new();
    if let Some(props) = obj.get("properties") {
        let props = props.as_object().ok_or_else(|| {
            GateError::configuration(format!(
                "schema at {location} has non-object \"properties\""
            ))
        })?;
        for (name, child) in props {
            let child = compile_at(child, &format!("{location}.{name}"))?;
            properties.insert(name.clone(), child);
        }
    }

    let mut required = BTreeSet::new();
    if let Some(names) = obj.get("required").and_then(Value::as_array) {
        for name in names {
            let name = name.as_str().ok_or_else(|| {
                GateError::configuration(format!(
                    "schema at {location} has a non-string \"required\" entry"
                ))
            })?;
            if !properties.contains_key(name) {
                return Err(GateError::configuration(format!(
                    "schema at {location} requires undeclared property \"{name}\""
                )));
            }
            required.insert(name.to_string());
        }
    }

    let deny_unknown = matches!(obj.get("additionalProperties"), Some(Value::Bool(false)));
    Ok(ObjectSchema {
        properties,
        required,
        deny_unknown,
    })
}

/// Generic schema pass followed by the per-tool cross-field rules.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    rules: RuleTable,
}

impl SchemaValidator {
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn validate(
        &self,
        schema: &Schema,
        tool: &str,
        args: &ArgMap,
    ) -> Result<(), ValidationError> {
        validate_args(schema, args)?;
        self.rules.check(tool, args)?;
        debug!(tool, "arguments passed schema validation");
        Ok(())
    }
}

/// Generic pass only: validate a top-level argument map against a root schema.
pub fn validate_args(schema: &Schema, args: &ArgMap) -> Result<(), ValidationError> {
    match schema.object() {
        Some(object) => validate_object(object, args, ""),
        None => Err(ValidationError::new(
            Violation::TypeMismatch,
            "",
            "arguments must be an object",
            schema.describe(),
            format!("object with {} keys", args.len()),
        )),
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_object(
    object: &ObjectSchema,
    map: &ArgMap,
    prefix: &str,
) -> Result<(), ValidationError> {
    for name in &object.required {
        let present = map.get(name).filter(|value| !value.is_null());
        if present.is_none() {
            let field = qualify(prefix, name);
            let expected = object
                .properties
                .get(name)
                .map(Schema::describe)
                .unwrap_or_default();
            let received = if map.contains_key(name) { "null" } else { "absent" };
            return Err(ValidationError::new(
                Violation::MissingRequired,
                field.clone(),
                format!("missing required argument '{field}'"),
                expected.clone(),
                received,
            )
            .with_hint(format!("Provide '{field}' as {expected}.")));
        }
    }

    if object.deny_unknown {
        for (name, value) in map {
            if object.properties.contains_key(name) {
                continue;
            }
            let field = qualify(prefix, name);
            let allowed = object.allowed_names();
            let hint = match closest_name(name, object.properties.keys()) {
                Some(candidate) => format!(
                    "Did you mean '{}'? Allowed arguments: {allowed}.",
                    qualify(prefix, candidate)
                ),
                None => format!("Remove '{field}'. Allowed arguments: {allowed}."),
            };
            return Err(ValidationError::new(
                Violation::UnknownArgument,
                field.clone(),
                format!("unknown argument '{field}'"),
                format!("one of: {allowed}"),
                describe_received(&field, value),
            )
            .with_hint(hint));
        }
    }

    for (name, child) in &object.properties {
        if let Some(value) = map.get(name) {
            validate_value(child, value, &qualify(prefix, name))?;
        }
    }
    Ok(())
}

fn closest_name<'a>(name: &str, candidates: impl Iterator<Item = &'a String>) -> Option<&'a str> {
    candidates
        .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .fold(None, |best: Option<(f64, &String)>, current| match best {
            Some(best) if best.0 >= current.0 => Some(best),
            _ => Some(current),
        })
        .map(|(_, candidate)| candidate.as_str())
}

fn validate_value(schema: &Schema, value: &ArgValue, field: &str) -> Result<(), ValidationError> {
    if value.is_null() {
        return Err(ValidationError::new(
            Violation::NullValue,
            field,
            format!("'{field}' value is null"),
            schema.describe(),
            "null",
        )
        .with_hint(format!("Supply a non-null value for '{field}' or omit it.")));
    }

    if let [node] = schema.variants() {
        return validate_node(node, value, field);
    }

    // A lone string stands for a one-element array, so against an array that
    // needs more items the useful message is the item count, not the type.
    if let ArgValue::String(_) = value {
        let strict_array_min = schema.variants().iter().find_map(|node| match node {
            SchemaNode::Array {
                min_items: Some(min),
                ..
            } if *min > 1 => Some(*min),
            _ => None,
        });
        if let Some(min) = strict_array_min {
            return Err(too_few_items(field, min, 1, value));
        }
    }

    let mut constraint_error: Option<ValidationError> = None;
    for node in schema.variants() {
        if !node.kind().accepts(value) {
            continue;
        }
        match validate_node(node, value, field) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_type_mismatch() && err.field == field => continue,
            Err(err) => {
                constraint_error.get_or_insert(err);
                break;
            }
        }
    }
    if let Some(err) = constraint_error {
        return Err(err);
    }

    let kinds: Vec<&str> = schema.kinds().into_iter().map(Kind::as_str).collect();
    Err(ValidationError::new(
        Violation::TypeMismatch,
        field,
        format!(
            "'{field}' has the wrong type: expected one of {}",
            kinds.join(", ")
        ),
        format!("one of {}", kinds.join(", ")),
        describe_received(field, value),
    ))
}

fn type_mismatch(kind: Kind, value: &ArgValue, field: &str) -> ValidationError {
    let article = match kind {
        Kind::Integer | Kind::Array | Kind::Object => "an",
        _ => "a",
    };
    ValidationError::new(
        Violation::TypeMismatch,
        field,
        format!(
            "'{field}' must be {article} {kind}, got {}",
            value.kind_label()
        ),
        kind.as_str(),
        describe_received(field, value),
    )
}

fn too_few_items(field: &str, min: usize, actual: usize, value: &ArgValue) -> ValidationError {
    ValidationError::new(
        Violation::TooFewItems,
        field,
        format!("'{field}' requires at least {min} items, got {actual}"),
        format!("array with at least {min} items"),
        describe_received(field, value),
    )
    .with_hint(format!(
        "Pass '{field}' as an array of {min} or more entries."
    ))
}

fn validate_node(node: &SchemaNode, value: &ArgValue, field: &str) -> Result<(), ValidationError> {
    if !node.kind().accepts(value) {
        return Err(type_mismatch(node.kind(), value, field));
    }
    match (node, value) {
        (SchemaNode::String { allowed: Some(allowed) }, ArgValue::String(s)) => {
            if allowed.iter().any(|member| member == s) {
                Ok(())
            } else {
                let listed = allowed.join(", ");
                Err(ValidationError::new(
                    Violation::NotInEnum,
                    field,
                    format!("'{field}' must be one of: {listed}"),
                    format!("one of: {listed}"),
                    describe_received(field, value),
                ))
            }
        }
        (SchemaNode::Integer { bounds } | SchemaNode::Number { bounds }, _) => {
            check_bounds(*bounds, value, field)
        }
        (SchemaNode::Array { items, min_items }, ArgValue::Array(elements)) => {
            if let Some(min) = *min_items {
                if elements.len() < min {
                    return Err(too_few_items(field, min, elements.len(), value));
                }
            }
            if let Some(items) = items {
                for (index, element) in elements.iter().enumerate() {
                    validate_value(items, element, &format!("{field}[{index}]"))?;
                }
            }
            Ok(())
        }
        (SchemaNode::Object(object), ArgValue::Object(map)) => validate_object(object, map, field),
        _ => Ok(()),
    }
}

fn check_bounds(bounds: Bounds, value: &ArgValue, field: &str) -> Result<(), ValidationError> {
    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    if let Some(minimum) = bounds.minimum {
        if number < minimum {
            return Err(ValidationError::new(
                Violation::BelowMinimum,
                field,
                format!("'{field}' is below minimum {minimum}"),
                format!(">= {minimum}"),
                describe_received(field, value),
            ));
        }
    }
    if let Some(maximum) = bounds.maximum {
        if number > maximum {
            return Err(ValidationError::new(
                Violation::ExceedsMaximum,
                field,
                format!("'{field}' exceeds maximum {maximum}"),
                format!("<= {maximum}"),
                describe_received(field, value),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redact::REDACTED;
    use crate::value::args_from_json;
    use serde_json::json;

    fn args(raw: Value) -> ArgMap {
        args_from_json(raw.as_object().unwrap())
    }

    fn reject(schema: &Schema, raw: Value) -> ValidationError {
        validate_args(schema, &args(raw)).unwrap_err()
    }

    fn diff_schema() -> Schema {
        Schema::compile_root(&json!({
            "type": "object",
            "properties": {
                "profiles": {
                    "type": ["string", "array"],
                    "items": { "type": "string" },
                    "minItems": 2
                },
                "nodecount": { "type": "integer", "minimum": 1, "maximum": 500 }
            },
            "required": ["profiles"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    fn top_schema() -> Schema {
        Schema::compile_root(&json!({
            "type": "object",
            "properties": {
                "profile": { "type": "string" },
                "format": { "type": "string", "enum": ["text", "json"] },
                "cum": { "type": "boolean" },
                "ratio": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                "checks": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "metric": { "type": "string", "enum": ["cpu", "heap"] },
                            "max": { "type": "number", "minimum": 0 }
                        },
                        "required": ["metric"],
                        "additionalProperties": false
                    }
                },
                "labels": { "type": "object" }
            },
            "required": ["profile"],
            "additionalProperties": false
        }))
        .unwrap()
    }

    #[test]
    fn single_string_where_two_items_are_required_reports_min_items() {
        let err = reject(&diff_schema(), json!({"profiles": "only-one.pprof"}));
        assert_eq!(err.violation, Violation::TooFewItems);
        assert_eq!(err.field, "profiles");
        assert!(err.message.contains("at least 2 items"), "{}", err.message);
        assert!(!err.message.contains("type"));
    }

    #[test]
    fn union_accepts_array_of_two() {
        let pair = args(json!({"profiles": ["a.pprof", "b.pprof"]}));
        validate_args(&diff_schema(), &pair).unwrap();
    }

    #[test]
    fn union_with_no_matching_kind_names_all_kinds() {
        let err = reject(&diff_schema(), json!({"profiles": 7}));
        assert_eq!(err.violation, Violation::TypeMismatch);
        assert_eq!(err.expected, "one of string, array");
    }

    #[test]
    fn union_reports_element_errors_with_index() {
        let err = reject(&diff_schema(), json!({"profiles": ["a.pprof", 3]}));
        assert_eq!(err.field, "profiles[1]");
        assert_eq!(err.violation, Violation::TypeMismatch);
    }

    #[test]
    fn unknown_argument_is_named() {
        let schema = Schema::compile_root(&json!({
            "type": "object",
            "properties": { "profile": { "type": "string" } },
            "additionalProperties": false
        }))
        .unwrap();
        let err = reject(&schema, json!({"profile": "x.pprof", "bogus": 1}));
        assert_eq!(err.violation, Violation::UnknownArgument);
        assert_eq!(err.field, "bogus");
        assert!(err.message.contains("bogus"));
        assert_eq!(err.expected, "one of: profile");
    }

    #[test]
    fn unknown_argument_suggests_close_name() {
        let err = reject(&top_schema(), json!({"profile": "x", "formt": "json"}));
        let hint = err.hint.unwrap();
        assert!(hint.contains("Did you mean 'format'?"), "{hint}");
    }

    #[test]
    fn missing_required_comes_before_unknown() {
        let err = reject(&top_schema(), json!({"bogus": true}));
        assert_eq!(err.violation, Violation::MissingRequired);
        assert_eq!(err.field, "profile");
        assert_eq!(err.received, "absent");
        assert!(err.hint.as_deref().unwrap().contains("'profile'"));
    }

    #[test]
    fn cross_field_rules_wait_for_the_generic_pass() {
        use crate::rules::CrossFieldRule;

        let validator = SchemaValidator::new(RuleTable::new().with_rules(
            "top",
            vec![CrossFieldRule::RequiresTogether("format", "cum")],
        ));
        let schema = top_schema();

        let err = validator
            .validate(&schema, "top", &args(json!({"format": "text"})))
            .unwrap_err();
        assert_eq!(err.violation, Violation::MissingRequired);
        assert_eq!(err.field, "profile");

        let half = args(json!({"profile": "p", "format": "text"}));
        let err = validator.validate(&schema, "top", &half).unwrap_err();
        assert_eq!(err.violation, Violation::Conditional);
        assert_eq!(err.field, "cum");

        let complete = args(json!({"profile": "p", "format": "text", "cum": true}));
        validator.validate(&schema, "top", &complete).unwrap();
    }

    #[test]
    fn null_required_value_counts_as_missing() {
        let err = reject(&top_schema(), json!({"profile": null}));
        assert_eq!(err.violation, Violation::MissingRequired);
        assert_eq!(err.received, "null");
    }

    #[test]
    fn null_optional_value_is_rejected() {
        let err = reject(&top_schema(), json!({"profile": "p", "cum": null}));
        assert_eq!(err.violation, Violation::NullValue);
        assert!(err.message.contains("value is null"));
        assert!(err.hint.is_some());
    }

    #[test]
    fn enum_and_bounds_produce_distinct_errors() {
        let schema = top_schema();
        let err = reject(&schema, json!({"profile": "p", "format": "xml"}));
        assert_eq!(err.violation, Violation::NotInEnum);

        let err = reject(&schema, json!({"profile": "p", "ratio": -0.5}));
        assert_eq!(err.violation, Violation::BelowMinimum);

        let err = reject(&schema, json!({"profile": "p", "ratio": 1.5}));
        assert_eq!(err.violation, Violation::ExceedsMaximum);
    }

    #[test]
    fn integers_must_be_whole() {
        let fractional = json!({"profiles": ["a", "b"], "nodecount": 2.5});
        let err = reject(&diff_schema(), fractional);
        assert_eq!(err.violation, Violation::TypeMismatch);
        assert_eq!(err.field, "nodecount");
        let whole = json!({"profiles": ["a", "b"], "nodecount": 25.0});
        validate_args(&diff_schema(), &args(whole)).unwrap();
    }

    #[test]
    fn nested_errors_use_dot_bracket_paths() {
        let err = validate_args(
            &top_schema(),
            &args(json!({
                "profile": "p",
                "checks": [
                    {"metric": "cpu", "max": 1},
                    {"metric": "heap"},
                    {"metric": "cpu", "max": -4}
                ]
            })),
        )
        .unwrap_err();
        assert_eq!(err.field, "checks[2].max");
        assert_eq!(err.violation, Violation::BelowMinimum);
    }

    #[test]
    fn free_form_objects_pass_through() {
        let labelled = args(json!({
            "profile": "p",
            "labels": {"team": "core", "nested": {"x": 1}}
        }));
        validate_args(&top_schema(), &labelled).unwrap();
    }

    #[test]
    fn validation_is_deterministic() {
        let schema = top_schema();
        let input = args(json!({"zzz": 1, "aaa": 2, "profile": "p", "format": "bad"}));
        let first = validate_args(&schema, &input).unwrap_err();
        for _ in 0..16 {
            assert_eq!(validate_args(&schema, &input).unwrap_err(), first);
        }
        assert_eq!(first.field, "aaa");
    }

    #[test]
    fn credential_values_never_appear_in_errors() {
        let secret = json!({"profile": "p", "api_key": "sk-abcdef"});
        let err = reject(&top_schema(), secret);
        assert_eq!(err.received, REDACTED);
        let rendered = format!("{err:?}");
        assert!(!rendered.contains("sk-abcdef"));
    }

    #[test]
    fn compile_rejects_bad_schemas() {
        assert!(Schema::compile(&json!({"type": "tuple"})).is_err());
        assert!(Schema::compile(&json!({"properties": {}})).is_err());
        let mixed_enum = json!({"type": "string", "enum": [1, 2]});
        assert!(Schema::compile(&mixed_enum).is_err());
        let ghost = json!({"type": "object", "properties": {}, "required": ["ghost"]});
        assert!(Schema::compile(&ghost).is_err());
        assert!(Schema::compile_root(&json!({"type": "string"})).is_err());
    }

    #[test]
    fn describe_mentions_constraints() {
        let schema = diff_schema();
        let profiles = &schema.object().unwrap().properties["profiles"];
        assert_eq!(profiles.describe(), "string or array (at least 2 items)");
    }
}
