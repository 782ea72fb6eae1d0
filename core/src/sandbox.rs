use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{GateError, ValidationError, Violation};

/// Upper bound on symlink hops followed by hand for dangling links.
const MAX_SYMLINK_HOPS: usize = 40;

/// Containment is decided on fully resolved paths. Paths that do not exist
/// yet resolve through their deepest existing ancestor.
#[derive(Debug, Clone, Default)]
pub struct PathSandbox {
    base: Option<PathBuf>,
}

impl PathSandbox {
    /// `None` disables sandboxing (trusted local/CLI operation).
    pub fn new(base: Option<PathBuf>) -> Self {
        Self { base }
    }

    pub fn disabled() -> Self {
        Self { base: None }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.base.is_some()
    }

    /// Resolve the configured base the same way every call does. Used as a
    /// startup preflight so a broken base fails the process, not the first call.
    pub fn canonical_base(&self) -> Result<Option<PathBuf>, GateError> {
        match &self.base {
            None => Ok(None),
            Some(base) => resolve_base(base).map(|(_, canonical)| Some(canonical)),
        }
    }

    pub fn resolve(&self, raw: &str) -> Result<PathBuf, GateError> {
        if raw.is_empty() {
            return Ok(PathBuf::new());
        }
        if raw.contains('\0') {
            return Err(ValidationError::new(
                Violation::Malformed,
                "",
                "path contains a NUL byte",
                "a filesystem path",
                "path containing a NUL byte",
            )
            .into());
        }

        let normalized = normalize_lexically(Path::new(raw));
        let Some(base) = &self.base else {
            return Ok(normalized);
        };

        let (absolute_base, canonical_base) = resolve_base(base)?;
        let candidate = if normalized.is_absolute() {
            normalized
        } else {
            absolute_base.join(&normalized)
        };
        let resolved = canonicalize_allowing_missing(&candidate, MAX_SYMLINK_HOPS)?;

        if resolved.strip_prefix(&canonical_base).is_err() {
            warn!(base = %canonical_base.display(), "rejected path outside base directory");
            return Err(GateError::PathEscape {
                field: String::new(),
                base: canonical_base,
                input: raw.to_string(),
            });
        }
        debug!(path = %resolved.display(), "path resolved inside sandbox");
        Ok(resolved)
    }
}

fn resolve_base(base: &Path) -> Result<(PathBuf, PathBuf), GateError> {
    let absolute = std::path::absolute(base).map_err(|err| {
        GateError::configuration(format!(
            "base directory {} cannot be made absolute: {err}",
            base.display()
        ))
    })?;
    let canonical = fs::canonicalize(&absolute).map_err(|err| {
        GateError::configuration(format!(
            "base directory {} cannot be resolved: {err}",
            absolute.display()
        ))
    })?;
    Ok((absolute, canonical))
}

/// Collapse `.`/`..` and redundant separators without touching the
/// filesystem. Leading `..` of a relative path are kept; `/..` is `/`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// Real path of `candidate`, allowing trailing segments that do not exist
/// yet. Dangling symlinks along the way are followed by hand, since the
/// file a caller creates through one would land at the link's target.
fn canonicalize_allowing_missing(candidate: &Path, max_hops: usize) -> Result<PathBuf, GateError> {
    let mut current = candidate.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();
    let mut hops = 0;

    loop {
        match fs::canonicalize(&current) {
            Ok(mut resolved) => {
                for segment in missing.iter().rev() {
                    resolved.push(segment);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if is_symlink(&current) {
                    hops += 1;
                    if hops > max_hops {
                        return Err(GateError::configuration(
                            "too many levels of symbolic links while resolving path",
                        ));
                    }
                    let target = fs::read_link(&current).map_err(|err| {
                        GateError::configuration(format!("cannot read symbolic link: {err}"))
                    })?;
                    current = match current.parent() {
                        Some(parent) if target.is_relative() => parent.join(target),
                        _ => target,
                    };
                    continue;
                }

                if matches!(current.components().next_back(), Some(Component::ParentDir)) {
                    // `missing/..` cannot be walked upward segment by segment.
                    current = normalize_lexically(&current);
                    continue;
                }

                let (Some(name), Some(parent)) = (current.file_name(), current.parent()) else {
                    return Err(GateError::configuration(
                        "no existing ancestor found while resolving path",
                    ));
                };
                missing.push(name.to_os_string());
                current = parent.to_path_buf();
            }
            Err(err) => {
                return Err(GateError::configuration(format!(
                    "filesystem error while resolving path: {err}"
                )));
            }
        }
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_symlink())
}
