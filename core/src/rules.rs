use std::collections::HashMap;
use std::fmt;

use crate::error::{ValidationError, Violation};
use crate::value::{ArgMap, ArgValue};

/// Runs after the generic schema pass, so declared fields have their
/// declared kinds.
pub type RuleCheck = fn(&ArgMap) -> Result<(), ValidationError>;

#[derive(Clone)]
pub enum CrossFieldRule {
    /// Either both fields are present or neither is.
    RequiresTogether(&'static str, &'static str),
    /// When `field` equals `equals`, `requires` must be present.
    RequiredWhen {
        field: &'static str,
        equals: &'static str,
        requires: &'static str,
    },
    ExactlyOneOf(&'static [&'static str]),
    /// Tool-specific check registered by name.
    Custom {
        name: &'static str,
        check: RuleCheck,
    },
}

impl fmt::Debug for CrossFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrossFieldRule::RequiresTogether(a, b) => {
                f.debug_tuple("RequiresTogether").field(a).field(b).finish()
            }
            CrossFieldRule::RequiredWhen {
                field,
                equals,
                requires,
            } => f
                .debug_struct("RequiredWhen")
                .field("field", field)
                .field("equals", equals)
                .field("requires", requires)
                .finish(),
            CrossFieldRule::ExactlyOneOf(names) => {
                f.debug_tuple("ExactlyOneOf").field(names).finish()
            }
            CrossFieldRule::Custom { name, .. } => {
                f.debug_struct("Custom").field("name", name).finish()
            }
        }
    }
}

fn is_present(args: &ArgMap, name: &str) -> bool {
    args.get(name).is_some_and(|value| !value.is_null())
}

impl CrossFieldRule {
    pub fn check(&self, args: &ArgMap) -> Result<(), ValidationError> {
        match self {
            CrossFieldRule::RequiresTogether(a, b) => {
                let (present, missing) = match (is_present(args, a), is_present(args, b)) {
                    (true, false) => (*a, *b),
                    (false, true) => (*b, *a),
                    _ => return Ok(()),
                };
                Err(ValidationError::new(
                    Violation::Conditional,
                    missing,
                    format!("'{missing}' is required when '{present}' is provided"),
                    format!("'{a}' and '{b}' together"),
                    "absent",
                )
                .with_hint(format!("Provide both '{a}' and '{b}', or neither.")))
            }
            CrossFieldRule::RequiredWhen {
                field,
                equals,
                requires,
            } => {
                let triggered =
                    matches!(args.get(*field), Some(ArgValue::String(v)) if v == equals);
                if !triggered || is_present(args, requires) {
                    return Ok(());
                }
                Err(ValidationError::new(
                    Violation::Conditional,
                    *requires,
                    format!("'{requires}' is required when '{field}' is \"{equals}\""),
                    format!("'{requires}' present"),
                    "absent",
                )
                .with_hint(format!(
                    "Provide '{requires}', or choose a different '{field}'."
                )))
            }
            CrossFieldRule::ExactlyOneOf(names) => {
                let present: Vec<&str> = names
                    .iter()
                    .copied()
                    .filter(|name| is_present(args, name))
                    .collect();
                if present.len() == 1 {
                    return Ok(());
                }
                let listed = names
                    .iter()
                    .map(|name| format!("'{name}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let (field, received) = match present.as_slice() {
                    [] => (names.first().copied().unwrap_or_default(), "none provided".to_string()),
                    [_, extra, ..] => (*extra, format!("{} provided", present.len())),
                    [_] => return Ok(()),
                };
                Err(ValidationError::new(
                    Violation::Conditional,
                    field,
                    format!("exactly one of {listed} must be provided"),
                    format!("exactly one of {listed}"),
                    received,
                )
                .with_hint(format!("Pass exactly one of {listed}.")))
            }
            CrossFieldRule::Custom { check, .. } => check(args),
        }
    }
}

/// Tool name → rules, fixed once the catalog is built.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    by_tool: HashMap<String, Vec<CrossFieldRule>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tool: impl Into<String>, rules: Vec<CrossFieldRule>) {
        if !rules.is_empty() {
            self.by_tool.entry(tool.into()).or_default().extend(rules);
        }
    }

    pub fn with_rules(mut self, tool: impl Into<String>, rules: Vec<CrossFieldRule>) -> Self {
        self.insert(tool, rules);
        self
    }

    pub fn rules_for(&self, tool: &str) -> &[CrossFieldRule] {
        self.by_tool.get(tool).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules are evaluated in registration order; the first failure wins.
    pub fn check(&self, tool: &str, args: &ArgMap) -> Result<(), ValidationError> {
        self.rules_for(tool)
            .iter()
            .try_for_each(|rule| rule.check(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::args_from_json;
    use serde_json::{Value, json};

    fn args(raw: Value) -> ArgMap {
        args_from_json(raw.as_object().unwrap())
    }

    fn ordered_window(args: &ArgMap) -> Result<(), ValidationError> {
        let from = args.get("from").and_then(ArgValue::as_integer);
        let to = args.get("to").and_then(ArgValue::as_integer);
        match (from, to) {
            (Some(from), Some(to)) if from >= to => Err(ValidationError::new(
                Violation::Conditional,
                "to",
                "'to' must be after 'from'",
                "to > from",
                to.to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn table() -> RuleTable {
        RuleTable::new()
            .with_rules(
                "download",
                vec![
                    CrossFieldRule::RequiresTogether("profile_id", "event_id"),
                    CrossFieldRule::Custom {
                        name: "ordered_window",
                        check: ordered_window,
                    },
                ],
            )
            .with_rules(
                "top",
                vec![CrossFieldRule::RequiredWhen {
                    field: "mode",
                    equals: "focus",
                    requires: "focus",
                }],
            )
            .with_rules(
                "bundle",
                vec![CrossFieldRule::ExactlyOneOf(&["handle", "artifacts"])],
            )
    }

    #[test]
    fn mutual_pair_names_the_missing_half() {
        let err = table().check("download", &args(json!({"event_id": "e1"}))).unwrap_err();
        assert_eq!(err.field, "profile_id");
        assert_eq!(err.violation, Violation::Conditional);
        let both = args(json!({"event_id": "e1", "profile_id": "p1"}));
        table().check("download", &both).unwrap();
        table().check("download", &args(json!({}))).unwrap();
    }

    #[test]
    fn discriminator_makes_field_required() {
        let err = table().check("top", &args(json!({"mode": "focus"}))).unwrap_err();
        assert_eq!(err.field, "focus");
        table().check("top", &args(json!({"mode": "summary"}))).unwrap();
        table().check("top", &args(json!({"mode": "focus", "focus": "gc"}))).unwrap();
    }

    #[test]
    fn exactly_one_of_rejects_none_and_both() {
        let t = table();
        let none = t.check("bundle", &args(json!({}))).unwrap_err();
        assert_eq!(none.field, "handle");
        let both = t
            .check("bundle", &args(json!({"handle": "h", "artifacts": []})))
            .unwrap_err();
        assert_eq!(both.field, "artifacts");
        t.check("bundle", &args(json!({"artifacts": []}))).unwrap();
    }

    #[test]
    fn custom_rules_run_after_builtin_ones() {
        let err = table()
            .check("download", &args(json!({"from": 10, "to": 5})))
            .unwrap_err();
        assert_eq!(err.field, "to");
    }

    #[test]
    fn tools_without_rules_pass() {
        table().check("unlisted", &args(json!({"anything": 1}))).unwrap();
    }
}
