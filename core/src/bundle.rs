use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{GateError, ValidationError, Violation};
use crate::handles::{HandleRegistry, is_handle};
use crate::redact::describe_received;
use crate::sandbox::PathSandbox;
use crate::value::ArgValue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub handle: String,
    /// Overrides the kind recorded at registration.
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleRequest {
    /// Expand every sibling registered with the anchor.
    Anchor(String),
    /// Resolve exactly these handles, in order.
    Entries(Vec<BundleEntry>),
}

fn malformed(field: String, message: String, value: &ArgValue) -> GateError {
    let received = describe_received(&field, value);
    ValidationError::new(
        Violation::Malformed,
        field,
        message,
        "a handle, or an array of {handle, kind?} objects",
        received,
    )
    .with_hint(
        "Use handles returned by artifacts_list or by the tool that produced the artifacts.",
    )
    .into()
}

impl BundleRequest {
    /// Parse the argument shape; `field` labels errors.
    pub fn from_arg(field: &str, value: &ArgValue) -> Result<Self, GateError> {
        match value {
            ArgValue::String(token) if is_handle(token) => Ok(BundleRequest::Anchor(token.clone())),
            ArgValue::String(_) => Err(malformed(
                field.to_string(),
                format!("'{field}' must be a handle, not a path"),
                value,
            )),
            ArgValue::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| parse_entry(&format!("{field}[{index}]"), item))
                .collect::<Result<Vec<_>, _>>()
                .map(BundleRequest::Entries),
            other => Err(malformed(
                field.to_string(),
                format!("'{field}' must be a handle or an array of handle entries"),
                other,
            )),
        }
    }
}

fn parse_entry(field: &str, item: &ArgValue) -> Result<BundleEntry, GateError> {
    let Some(object) = item.as_object() else {
        return Err(malformed(
            field.to_string(),
            format!("'{field}' must be an object with a 'handle'"),
            item,
        ));
    };
    let handle_field = format!("{field}.handle");
    let handle = match object.get("handle") {
        Some(ArgValue::String(token)) if is_handle(token) => token.clone(),
        Some(other) => {
            return Err(malformed(
                handle_field.clone(),
                format!("'{handle_field}' must be a handle"),
                other,
            ));
        }
        None => {
            return Err(malformed(
                handle_field.clone(),
                format!("missing required argument '{handle_field}'"),
                &ArgValue::Null,
            ));
        }
    };
    let kind = match object.get("kind") {
        None | Some(ArgValue::Null) => None,
        Some(ArgValue::String(kind)) => Some(kind.clone()).filter(|k| !k.is_empty()),
        Some(other) => {
            let kind_field = format!("{field}.kind");
            return Err(malformed(
                kind_field.clone(),
                format!("'{kind_field}' must be a string"),
                other,
            ));
        }
    };
    Ok(BundleEntry { handle, kind })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedBundle {
    pub paths: BTreeMap<String, PathBuf>,
    pub warnings: Vec<String>,
}

pub struct BundleResolver<'a> {
    registry: &'a HandleRegistry,
    sandbox: &'a PathSandbox,
}

impl<'a> BundleResolver<'a> {
    pub fn new(registry: &'a HandleRegistry, sandbox: &'a PathSandbox) -> Self {
        Self { registry, sandbox }
    }

    pub fn resolve(
        &self,
        field: &str,
        request: &BundleRequest,
    ) -> Result<ResolvedBundle, GateError> {
        let bundle = match request {
            BundleRequest::Anchor(anchor) => self.resolve_anchor(field, anchor)?,
            BundleRequest::Entries(entries) => self.resolve_entries(field, entries)?,
        };
        debug!(
            field,
            kinds = bundle.paths.len(),
            warnings = bundle.warnings.len(),
            "bundle resolved"
        );
        Ok(bundle)
    }

    fn resolve_anchor(&self, field: &str, anchor: &str) -> Result<ResolvedBundle, GateError> {
        let siblings = self
            .registry
            .bundle_entries(anchor)
            .map_err(|err| err.at_field(field))?;

        let mut bundle = ResolvedBundle::default();
        for sibling in siblings {
            if sibling.metadata.kind.is_empty() {
                bundle
                    .warnings
                    .push(format!(
                        "artifact {} has no kind label; skipped",
                        sibling.handle
                    ));
                continue;
            }
            if bundle.paths.contains_key(&sibling.metadata.kind) {
                continue;
            }
            let path = self.sandboxed(field, &sibling.metadata.path)?;
            bundle.paths.insert(sibling.metadata.kind, path);
        }
        Ok(bundle)
    }

    fn resolve_entries(
        &self,
        field: &str,
        entries: &[BundleEntry],
    ) -> Result<ResolvedBundle, GateError> {
        let mut bundle = ResolvedBundle::default();
        for (index, entry) in entries.iter().enumerate() {
            let entry_field = format!("{field}[{index}].handle");
            let metadata = self
                .registry
                .require(&entry.handle)
                .map_err(|err| err.at_field(entry_field.clone()))?;
            let kind = entry
                .kind
                .clone()
                .or_else(|| Some(metadata.kind.clone()).filter(|k| !k.is_empty()));
            let Some(kind) = kind else {
                bundle.warnings.push(format!(
                    "{field}[{index}]: artifact {} has no kind label and none was given; skipped",
                    entry.handle
                ));
                continue;
            };
            if bundle.paths.contains_key(&kind) {
                bundle.warnings.push(format!(
                    "{field}[{index}]: kind '{kind}' already resolved by an earlier entry; skipped"
                ));
                continue;
            }
            let path = self.sandboxed(&entry_field, &metadata.path)?;
            bundle.paths.insert(kind, path);
        }
        Ok(bundle)
    }

    fn sandboxed(&self, field: &str, path: &Path) -> Result<PathBuf, GateError> {
        let raw = path.to_str().ok_or_else(|| {
            GateError::configuration("registered artifact path is not valid UTF-8").at_field(field)
        })?;
        self.sandbox.resolve(raw).map_err(|err| err.at_field(field))
    }
}
