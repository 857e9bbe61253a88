use serde::Serialize;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::model::ArtifactDescriptor;
use super::report::{ResultSection, ServiceResult};

/// What the scanning host hands to the service for one submitted file.
pub trait TaskRequest {
    fn file_path(&self) -> &Path;
    fn working_directory(&self) -> &Path;
    fn add_section(&mut self, section: ResultSection);
    /// Artifact the host should analyze again.
    fn add_extracted(&mut self, artifact: ArtifactDescriptor);
    /// Artifact kept for display/download only.
    fn add_supplementary(&mut self, artifact: ArtifactDescriptor);
}

/// In-process host that collects everything the service registers.
#[derive(Debug, Clone, Serialize)]
pub struct LocalTask {
    pub file_path: PathBuf,
    pub working_directory: PathBuf,
    pub result: ServiceResult,
    pub extracted: Vec<ArtifactDescriptor>,
    pub supplementary: Vec<ArtifactDescriptor>,
}

impl LocalTask {
    pub fn new(file_path: impl Into<PathBuf>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            working_directory: working_directory.into(),
            result: ServiceResult::default(),
            extracted: Vec::new(),
            supplementary: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty() && self.extracted.is_empty() && self.supplementary.is_empty()
    }
}

impl TaskRequest for LocalTask {
    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    fn add_section(&mut self, section: ResultSection) {
        self.result.add_section(section);
    }

    fn add_extracted(&mut self, artifact: ArtifactDescriptor) {
        debug!(name = %artifact.name, "extracted artifact");
        self.extracted.push(artifact);
    }

    fn add_supplementary(&mut self, artifact: ArtifactDescriptor) {
        debug!(name = %artifact.name, "supplementary artifact");
        self.supplementary.push(artifact);
    }
}
