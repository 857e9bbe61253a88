use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::DecompilerError;

/// Why a failed decompilation is still an acceptable outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    NotDotnet,
    Unsupported,
    Corrupted,
    NoMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureSignature {
    pub pattern: String,
    pub outcome: FailureOutcome,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisoryRule {
    pub attribute: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureLibrary {
    pub failure_signatures: Vec<FailureSignature>,
    #[serde(default)]
    pub advisory_attributes: Vec<AdvisoryRule>,
}

impl Default for SignatureLibrary {
    fn default() -> Self {
        Self {
            failure_signatures: vec![
                FailureSignature {
                    pattern: "System.BadImageFormatException".to_string(),
                    outcome: FailureOutcome::NotDotnet,
                    note: "not a .NET file".to_string(),
                },
                FailureSignature {
                    pattern: "PEFileNotSupportedException".to_string(),
                    outcome: FailureOutcome::Unsupported,
                    note: "file not supported by ILSpy, probably not a .NET file".to_string(),
                },
                FailureSignature {
                    pattern: "System.NullReferenceException: Object reference not set to an instance of an object"
                        .to_string(),
                    outcome: FailureOutcome::Corrupted,
                    note: "a real .NET file, but corrupted".to_string(),
                },
                FailureSignature {
                    pattern: "PE file does not contain any managed metadata".to_string(),
                    outcome: FailureOutcome::NoMetadata,
                    note: "PE reader found no metadata".to_string(),
                },
            ],
            advisory_attributes: vec![AdvisoryRule {
                attribute: "SuppressIldasm".to_string(),
                title: "SuppressIldasm attribute found".to_string(),
                body: "Author wanted to reduce visibility on this code, it may be genuine, \
                       but this was seen in malicious samples too."
                    .to_string(),
            }],
        }
    }
}

impl SignatureLibrary {
    /// First signature whose pattern occurs in `stderr`, in table order.
    pub fn classify(&self, stderr: &[u8]) -> Option<&FailureSignature> {
        self.failure_signatures
            .iter()
            .find(|s| !s.pattern.is_empty() && contains_bytes(stderr, s.pattern.as_bytes()))
    }

    pub fn advisories_for(&self, keys: &[&str]) -> Vec<&AdvisoryRule> {
        self.advisory_attributes
            .iter()
            .filter(|rule| keys.contains(&rule.attribute.as_str()))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, DecompilerError> {
        let raw = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(|e| {
                DecompilerError::ParseError(format!("invalid YAML signature file: {}", e))
            }),
            "json" => serde_json::from_str(&raw).map_err(|e| {
                DecompilerError::ParseError(format!("invalid JSON signature file: {}", e))
            }),
            _ => {
                if raw.trim_start().starts_with('{') {
                    serde_json::from_str(&raw).map_err(|e| {
                        DecompilerError::ParseError(format!(
                            "unable to parse signatures as JSON (extension not set): {}",
                            e
                        ))
                    })
                } else {
                    serde_yaml::from_str(&raw).map_err(|e| {
                        DecompilerError::ParseError(format!(
                            "unable to parse signatures as YAML (extension not set): {}",
                            e
                        ))
                    })
                }
            }
        }
    }

    pub fn write_template(path: &Path) -> Result<(), DecompilerError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("yaml")
            .to_ascii_lowercase();
        let rules = Self::default();
        let content = if ext == "json" {
            serde_json::to_string_pretty(&rules).map_err(|e| {
                DecompilerError::ParseError(format!("serialize signatures to JSON failed: {}", e))
            })?
        } else {
            serde_yaml::to_string(&rules).map_err(|e| {
                DecompilerError::ParseError(format!("serialize signatures to YAML failed: {}", e))
            })?
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
