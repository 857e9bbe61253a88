pub mod cli;
pub mod errors;
pub mod modules;

// Re-export common items at crate root for benches/tests
pub use errors::DecompilerError;
pub use modules::dotnet::{DotnetDecompiler, LocalTask, ServiceConfig, TaskRequest};
