pub mod dotnet;

// module-level API
pub use dotnet::{DotnetDecompiler, LocalTask, TaskRequest};
