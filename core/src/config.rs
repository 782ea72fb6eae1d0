use std::path::PathBuf;

use crate::sandbox::PathSandbox;

pub const BASE_DIR_ENV: &str = "PROFGATE_BASE_DIR";

/// Gate configuration, read once at process start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    /// `None` disables sandboxing (trusted local operation).
    pub base_dir: Option<PathBuf>,
}

impl GateConfig {
    /// Reads [`BASE_DIR_ENV`]; call after `.env` has been loaded.
    pub fn from_env() -> Self {
        Self::from_raw(&std::env::var(BASE_DIR_ENV).unwrap_or_default())
    }

    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self {
            base_dir: (!trimmed.is_empty()).then(|| PathBuf::from(trimmed)),
        }
    }

    pub fn sandbox_enabled(&self) -> bool {
        self.base_dir.is_some()
    }

    pub fn sandbox(&self) -> PathSandbox {
        PathSandbox::new(self.base_dir.clone())
    }
}
