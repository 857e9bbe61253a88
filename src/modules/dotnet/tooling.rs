use std::path::{Path, PathBuf};

use super::model::{DecompileStage, ToolInvocation};

pub const DEFAULT_PROGRAM: &str = "ilspycmd";
pub const DECOMPILED_SUFFIX: &str = ".decompiled.cs";
pub const IL_SUFFIX: &str = ".il";
pub const PROJECT_ARCHIVE_NAME: &str = "project.zip";

pub struct IlspyTooling;

impl IlspyTooling {
    pub fn build_invocation(
        stage: DecompileStage,
        program: &str,
        input: &Path,
        output_dir: &Path,
        disable_update_check: bool,
    ) -> ToolInvocation {
        let mut args = Vec::new();
        if disable_update_check {
            args.push("--disable-updatecheck".to_string());
        }
        let note = match stage {
            DecompileStage::Full => "Whole assembly decompiled into a single C# file.",
            DecompileStage::IlCode => {
                args.push("--ilcode".to_string());
                "IL listing, useful when the C# reconstruction is mangled."
            }
            DecompileStage::Project => {
                args.push("--project".to_string());
                args.push("--nested-directories".to_string());
                "Compilable project split into one file per type."
            }
        };
        args.push("--outputdir".to_string());
        args.push(output_dir.display().to_string());
        args.push(input.display().to_string());

        ToolInvocation {
            program: program.to_string(),
            args,
            note: note.to_string(),
        }
    }

    /// ilspycmd names its single-file outputs after the input file stem.
    pub fn expected_output(stage: DecompileStage, input: &Path, output_dir: &Path) -> Option<PathBuf> {
        let suffix = match stage {
            DecompileStage::Full => DECOMPILED_SUFFIX,
            DecompileStage::IlCode => IL_SUFFIX,
            DecompileStage::Project => return None,
        };
        Some(output_dir.join(format!("{}{}", file_stem(input), suffix)))
    }
}

fn file_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
