// src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum DecompilerError {
    // === I/O ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === external tool ===
    #[error("failed to launch '{program}': {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tool '{program}' failed (exit code {}): {stderr}", fmt_exit(.exit_code))]
    ToolFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("tool '{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("expected decompiler output not found: {}", path.display())]
    MissingOutput { path: PathBuf },

    // === rules / config ===
    #[error("Parse error: {0}")]
    ParseError(String),

    // === packaging ===
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Operation failed: {0}")]
    Generic(String),
}

fn fmt_exit(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
