use std::path::{Path, PathBuf};

use dotnet_decompiler::modules::dotnet::{
    ASSEMBLY_SECTION_TITLE, BackendBinary, DecompilerBackend, DotnetDecompiler, FailureOutcome,
    FailureSignature, InvocationResult, LocalTask, ServiceConfig, SignatureLibrary,
    ToolInvocation, extract_assembly_attributes, parse_attribute_line,
};
use dotnet_decompiler::DecompilerError;

/// Decompiler stand-in that fails the primary stage with a fixed stderr.
struct Crashing {
    binary: BackendBinary,
    stderr: &'static str,
}

impl DecompilerBackend for Crashing {
    fn name(&self) -> &'static str {
        "crashing"
    }

    fn binary(&self) -> &BackendBinary {
        &self.binary
    }

    fn run(&self, _plan: &ToolInvocation) -> Result<InvocationResult, DecompilerError> {
        Ok(InvocationResult {
            exit_code: None,
            stdout: Vec::new(),
            stderr: self.stderr.as_bytes().to_vec(),
        })
    }
}

fn crashing(stderr: &'static str) -> Box<Crashing> {
    Box::new(Crashing {
        binary: BackendBinary {
            name: "ilspycmd".to_string(),
            available: true,
            path: None,
        },
        stderr,
    })
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("dotnet_decompiler_it_{}", name));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn attribute_examples() {
    let title = parse_attribute_line("[assembly: AssemblyTitle(\"Foo\")]").unwrap();
    assert_eq!((title.key.as_str(), title.value.as_str()), ("AssemblyTitle", "\"Foo\""));
    let com = parse_attribute_line("[assembly: ComVisible(false)]").unwrap();
    assert_eq!((com.key.as_str(), com.value.as_str()), ("ComVisible", "false"));
    let dbg = parse_attribute_line("[assembly: Debuggable]").unwrap();
    assert_eq!((dbg.key.as_str(), dbg.value.as_str()), ("Debuggable", ""));
}

#[test]
fn attribute_block_from_file() {
    let dir = scratch("block");
    let file = dir.join("Sample.decompiled.cs");
    std::fs::write(
        &file,
        "[assembly: A(1)]\n[assembly: B(2)]\nnamespace X {\n[assembly: C(3)]\n",
    )
    .unwrap();
    let block = extract_assembly_attributes(&file).unwrap();
    assert_eq!(block.keys(), vec!["A", "B"]);
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn signal_termination_without_signature_is_fatal() {
    let dir = scratch("signal");
    let service = DotnetDecompiler::new(
        crashing("Segmentation fault"),
        SignatureLibrary::default(),
        ServiceConfig::default(),
    );
    let mut task = LocalTask::new("/samples/a.dll", &dir);
    let err = service.execute(&mut task).unwrap_err();
    assert!(matches!(err, DecompilerError::ToolFailed { exit_code: None, .. }));
    assert!(err.to_string().contains("Segmentation fault"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn extended_signature_table_changes_classification() {
    let dir = scratch("extended");
    let mut rules = SignatureLibrary::default();
    rules.failure_signatures.push(FailureSignature {
        pattern: "System.IO.EndOfStreamException".to_string(),
        outcome: FailureOutcome::Corrupted,
        note: "truncated sample".to_string(),
    });
    let service = DotnetDecompiler::new(
        crashing("System.IO.EndOfStreamException: Attempted to read past the end"),
        rules,
        ServiceConfig::default(),
    );
    let mut task = LocalTask::new("/samples/truncated.dll", &dir);
    service.execute(&mut task).unwrap();
    assert!(task.is_empty());
    assert!(task.result.find(ASSEMBLY_SECTION_TITLE).is_none());
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn from_config_reads_signature_file() {
    let dir = scratch("config");
    let rules_path = dir.join("signatures.yaml");
    SignatureLibrary::write_template(&rules_path).unwrap();
    let cfg = ServiceConfig {
        program: "/nonexistent/ilspycmd".to_string(),
        rules_path: Some(rules_path),
        ..ServiceConfig::default()
    };
    let service = DotnetDecompiler::from_config(cfg).unwrap();
    assert!(!service.backend().available());
    assert_eq!(service.rules().failure_signatures.len(), 4);

    let missing = run_missing_rules(&dir.join("absent.yaml"));
    assert!(matches!(missing, Err(DecompilerError::Io(_))));
    let _ = std::fs::remove_dir_all(dir);
}

fn run_missing_rules(path: &Path) -> Result<DotnetDecompiler, DecompilerError> {
    DotnetDecompiler::from_config(ServiceConfig {
        rules_path: Some(path.to_path_buf()),
        ..ServiceConfig::default()
    })
}
