use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::DecompilerError;

use super::tooling::DEFAULT_PROGRAM;

pub const TIMEOUT_ENV: &str = "DOTNET_DECOMPILER_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name looked up on `PATH`, or a path to the executable.
    pub program: String,
    pub disable_update_check: bool,
    /// Per-invocation limit; `None` waits forever.
    pub timeout_secs: Option<u64>,
    pub project_subdir: String,
    pub rules_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            disable_update_check: true,
            timeout_secs: None,
            project_subdir: "project".to_string(),
            rules_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self, DecompilerError> {
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or_else(|| raw.trim_start().starts_with('{'));
        if is_json {
            serde_json::from_str(&raw)
                .map_err(|e| DecompilerError::ParseError(format!("invalid JSON config: {}", e)))
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| DecompilerError::ParseError(format!("invalid YAML config: {}", e)))
        }
    }

    /// Applies `DOTNET_DECOMPILER_TIMEOUT_SECS`; `0` disables the timeout.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout) = timeout_from_env(std::env::var(TIMEOUT_ENV).ok().as_deref()) {
            self.timeout_secs = timeout;
        }
        self
    }
}

fn timeout_from_env(raw: Option<&str>) -> Option<Option<u64>> {
    match raw?.trim().parse::<u64>() {
        Ok(0) => Some(None),
        Ok(n) => Some(Some(n)),
        Err(_) => None,
    }
}
