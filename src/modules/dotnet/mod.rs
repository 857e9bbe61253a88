pub mod archive;
pub mod attributes;
pub mod backends;
pub mod config;
pub mod model;
pub mod report;
pub mod request;
pub mod rules;
pub mod service;
pub mod tooling;

pub use attributes::{AttributeBlock, extract_assembly_attributes, parse_attribute_line};
pub use backends::{BackendBinary, DecompilerBackend, IlspyBackend};
pub use config::ServiceConfig;
pub use model::{
    ArtifactDescriptor, ArtifactKind, AttributeEntry, DecompileStage, InvocationResult,
    ToolInvocation,
};
pub use report::{ResultSection, SectionBody, ServiceResult};
pub use request::{LocalTask, TaskRequest};
pub use rules::{AdvisoryRule, FailureOutcome, FailureSignature, SignatureLibrary};
pub use service::{ASSEMBLY_SECTION_TITLE, DotnetDecompiler};
pub use tooling::IlspyTooling;
