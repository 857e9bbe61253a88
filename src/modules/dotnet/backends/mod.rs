use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::errors::DecompilerError;
use crate::modules::dotnet::model::{InvocationResult, ToolInvocation};

pub mod ilspy;

pub use ilspy::IlspyBackend;

#[derive(Debug, Clone, Serialize)]
pub struct BackendBinary {
    pub name: String,
    pub available: bool,
    pub path: Option<PathBuf>,
}

impl BackendBinary {
    /// Resolves `program` either as an explicit path or by searching `PATH`.
    pub fn probe(program: &str) -> Self {
        let explicit = Path::new(program);
        if explicit.components().count() > 1 || explicit.is_absolute() {
            return Self {
                name: program.to_string(),
                available: is_executable(explicit),
                path: Some(explicit.to_path_buf()),
            };
        }
        probe_binary(program, &[program])
    }
}

/// The capability of running one decompiler invocation to completion.
pub trait DecompilerBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn binary(&self) -> &BackendBinary;

    fn available(&self) -> bool {
        self.binary().available
    }

    fn program(&self) -> String {
        self.binary()
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.binary().name.clone())
    }

    fn run(&self, plan: &ToolInvocation) -> Result<InvocationResult, DecompilerError>;
}

fn probe_binary(label: &str, candidates: &[&str]) -> BackendBinary {
    for c in candidates {
        if let Some(path) = find_in_path(c) {
            return BackendBinary {
                name: label.to_string(),
                available: true,
                path: Some(path),
            };
        }
    }
    BackendBinary {
        name: label.to_string(),
        available: false,
        path: None,
    }
}

fn find_in_path(bin: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(bin);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{}.exe", bin));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = std::fs::metadata(path) {
            return md.permissions().mode() & 0o111 != 0;
        }
    }
    #[cfg(not(unix))]
    {
        return true;
    }
    false
}
