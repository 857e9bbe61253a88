use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::DecompilerError;

use super::archive;
use super::attributes::{AttributeBlock, extract_assembly_attributes};
use super::backends::{DecompilerBackend, IlspyBackend};
use super::config::ServiceConfig;
use super::model::{
    ArtifactDescriptor, ArtifactKind, DecompileStage, InvocationResult, ToolInvocation,
};
use super::report::ResultSection;
use super::request::TaskRequest;
use super::rules::SignatureLibrary;
use super::tooling::{IlspyTooling, PROJECT_ARCHIVE_NAME};

pub const ASSEMBLY_SECTION_TITLE: &str = "Assembly Information";

/// Runs the three decompiler stages for one file and reports what they produced.
pub struct DotnetDecompiler {
    backend: Box<dyn DecompilerBackend>,
    rules: SignatureLibrary,
    config: ServiceConfig,
}

impl DotnetDecompiler {
    pub fn new(
        backend: Box<dyn DecompilerBackend>,
        rules: SignatureLibrary,
        config: ServiceConfig,
    ) -> Self {
        Self {
            backend,
            rules,
            config,
        }
    }

    /// Real `ilspycmd` backend, signatures from `rules_path` when set.
    pub fn from_config(config: ServiceConfig) -> Result<Self, DecompilerError> {
        let rules = match &config.rules_path {
            Some(path) => SignatureLibrary::load(path)?,
            None => SignatureLibrary::default(),
        };
        let backend = IlspyBackend::detect(&config.program).with_timeout(config.timeout_secs);
        if !backend.available() {
            warn!(program = %config.program, "decompiler not found, launches will fail");
        }
        Ok(Self::new(Box::new(backend), rules, config))
    }

    pub fn backend(&self) -> &dyn DecompilerBackend {
        self.backend.as_ref()
    }

    pub fn rules(&self) -> &SignatureLibrary {
        &self.rules
    }

    pub fn execute(&self, request: &mut dyn TaskRequest) -> Result<(), DecompilerError> {
        let input = request.file_path().to_path_buf();
        let workdir = request.working_directory().to_path_buf();
        std::fs::create_dir_all(&workdir)?;
        info!(input = %input.display(), "decompiling");

        let Some(decompiled) = self.run_full_decompilation(&input, &workdir)? else {
            return Ok(());
        };

        let attributes = extract_assembly_attributes(&decompiled)?;
        if let Some(section) = self.assembly_section(&attributes) {
            request.add_section(section);
        }

        request.add_extracted(describe(
            &decompiled,
            file_name(&decompiled),
            "Decompiled file",
            ArtifactKind::Extracted,
        )?);

        if let Some(il) = self.run_il_listing(&input, &workdir) {
            request.add_supplementary(describe(
                &il,
                file_name(&il),
                "IL Code file",
                ArtifactKind::Supplementary,
            )?);
        }

        let project_dir = workdir.join(&self.config.project_subdir);
        if self.run_project_extraction(&input, &project_dir) {
            self.publish_project(request, &workdir, &project_dir)?;
        }
        Ok(())
    }

    /// `Ok(None)` when the input is not something the decompiler can handle.
    pub fn run_full_decompilation(
        &self,
        input: &Path,
        out_dir: &Path,
    ) -> Result<Option<PathBuf>, DecompilerError> {
        let plan = self.plan(DecompileStage::Full, input, out_dir);
        let res = self.backend.run(&plan)?;

        if !res.success() {
            if let Some(sig) = self.rules.classify(&res.stderr) {
                info!(outcome = ?sig.outcome, note = %sig.note, "decompilation not applicable");
                return Ok(None);
            }
            return Err(DecompilerError::ToolFailed {
                program: plan.program,
                exit_code: res.exit_code,
                stderr: res.stderr_lossy(),
            });
        }

        let expected = IlspyTooling::expected_output(DecompileStage::Full, input, out_dir)
            .ok_or_else(|| DecompilerError::Generic("no output path for full stage".to_string()))?;
        if !expected.is_file() {
            return Err(DecompilerError::MissingOutput { path: expected });
        }
        Ok(Some(expected))
    }

    /// Best effort; any failure just means no IL listing.
    pub fn run_il_listing(&self, input: &Path, out_dir: &Path) -> Option<PathBuf> {
        let plan = self.plan(DecompileStage::IlCode, input, out_dir);
        if !self.run_optional(&plan, "IL listing")?.success() {
            return None;
        }
        let il = IlspyTooling::expected_output(DecompileStage::IlCode, input, out_dir)?;
        if il.is_file() {
            Some(il)
        } else {
            warn!(path = %il.display(), "IL listing reported success but file is missing");
            None
        }
    }

    pub fn run_project_extraction(&self, input: &Path, project_dir: &Path) -> bool {
        let plan = self.plan(DecompileStage::Project, input, project_dir);
        match self.run_optional(&plan, "project extraction") {
            Some(res) => res.success() && project_dir.is_dir(),
            None => false,
        }
    }

    fn assembly_section(&self, attributes: &AttributeBlock) -> Option<ResultSection> {
        if attributes.is_empty() {
            return None;
        }
        let mut section = ResultSection::ordered_key_value(ASSEMBLY_SECTION_TITLE);
        for entry in attributes.entries() {
            section.add_item(&entry.key, &entry.value);
        }
        for rule in self.rules.advisories_for(&attributes.keys()) {
            section.add_subsection(ResultSection::text(&rule.title, &rule.body));
        }
        info!(count = attributes.len(), "assembly attributes found");
        Some(section)
    }

    fn publish_project(
        &self,
        request: &mut dyn TaskRequest,
        workdir: &Path,
        project_dir: &Path,
    ) -> Result<(), DecompilerError> {
        // archive goes first in case the host caps the number of supplementary files
        let zip_path = archive::zip_directory(project_dir, &workdir.join(PROJECT_ARCHIVE_NAME))?;
        request.add_supplementary(describe(
            &zip_path,
            PROJECT_ARCHIVE_NAME.to_string(),
            "Project folder",
            ArtifactKind::Supplementary,
        )?);

        let files = archive::list_files(project_dir)?;
        debug!(count = files.len(), "registering project files");
        for path in files {
            let name = archive::relative_name(project_dir, &path);
            request.add_supplementary(describe(
                &path,
                name,
                "Project file",
                ArtifactKind::Supplementary,
            )?);
        }
        Ok(())
    }

    fn run_optional(
        &self,
        plan: &ToolInvocation,
        what: &str,
    ) -> Option<InvocationResult> {
        match self.backend.run(plan) {
            Ok(res) => {
                if !res.success() {
                    warn!(exit_code = ?res.exit_code, stderr = %res.stderr_lossy(), "{} failed", what);
                }
                Some(res)
            }
            Err(e) => {
                warn!(error = %e, "{} failed", what);
                None
            }
        }
    }

    fn plan(&self, stage: DecompileStage, input: &Path, out_dir: &Path) -> ToolInvocation {
        IlspyTooling::build_invocation(
            stage,
            &self.backend.program(),
            input,
            out_dir,
            self.config.disable_update_check,
        )
    }
}

fn describe(
    path: &Path,
    name: String,
    description: &str,
    kind: ArtifactKind,
) -> Result<ArtifactDescriptor, DecompilerError> {
    Ok(ArtifactDescriptor {
        name,
        description: description.to_string(),
        path: path.to_path_buf(),
        kind,
        sha256: sha256_file(path)?,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn sha256_file(path: &Path) -> Result<String, DecompilerError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::dotnet::backends::BackendBinary;
    use crate::modules::dotnet::report::SectionBody;
    use crate::modules::dotnet::request::LocalTask;
    use std::sync::{Arc, Mutex};

    const SOURCE: &str = "using System.Reflection;\n\n[assembly: AssemblyTitle(\"Sample\")]\n[assembly: InternalsVisibleTo(\"A\")]\n[assembly: InternalsVisibleTo(\"B\")]\nnamespace Sample {}\n";

    /// Fakes ilspycmd: writes outputs the way the real tool names them.
    struct FakeIlspy {
        binary: BackendBinary,
        full: (i32, &'static str, Option<&'static str>),
        il_exit: i32,
        project_exit: i32,
        calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl FakeIlspy {
        fn ok(source: &'static str) -> Self {
            Self {
                binary: BackendBinary {
                    name: "ilspycmd".to_string(),
                    available: true,
                    path: None,
                },
                full: (0, "", Some(source)),
                il_exit: 0,
                project_exit: 0,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(exit: i32, stderr: &'static str) -> Self {
            let mut s = Self::ok(SOURCE);
            s.full = (exit, stderr, None);
            s
        }
    }

    impl DecompilerBackend for FakeIlspy {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn binary(&self) -> &BackendBinary {
            &self.binary
        }

        fn run(&self, plan: &ToolInvocation) -> Result<InvocationResult, DecompilerError> {
            self.calls.lock().unwrap().push(plan.args.clone());
            let pos = plan.args.iter().position(|a| a == "--outputdir").unwrap();
            let out = PathBuf::from(&plan.args[pos + 1]);
            let input = PathBuf::from(plan.args.last().unwrap());
            let stem = input.file_stem().unwrap().to_string_lossy().to_string();
            std::fs::create_dir_all(&out).unwrap();

            let exit = if plan.args.iter().any(|a| a == "--ilcode") {
                if self.il_exit == 0 {
                    std::fs::write(out.join(format!("{}.il", stem)), ".assembly Sample {}").unwrap();
                }
                self.il_exit
            } else if plan.args.iter().any(|a| a == "--project") {
                if self.project_exit == 0 {
                    std::fs::create_dir_all(out.join("Properties")).unwrap();
                    std::fs::write(out.join("Sample.csproj"), "<Project />").unwrap();
                    std::fs::write(out.join("Properties/AssemblyInfo.cs"), "[assembly: X]").unwrap();
                }
                self.project_exit
            } else {
                let (exit, stderr, body) = self.full;
                if let Some(body) = body {
                    std::fs::write(out.join(format!("{}.decompiled.cs", stem)), body).unwrap();
                }
                return Ok(InvocationResult {
                    exit_code: Some(exit),
                    stdout: Vec::new(),
                    stderr: stderr.as_bytes().to_vec(),
                });
            };
            Ok(InvocationResult {
                exit_code: Some(exit),
                stdout: Vec::new(),
                stderr: if exit == 0 { Vec::new() } else { b"boom".to_vec() },
            })
        }
    }

    fn workdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dotnet_decompiler_service_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn service(backend: FakeIlspy) -> DotnetDecompiler {
        DotnetDecompiler::new(
            Box::new(backend),
            SignatureLibrary::default(),
            ServiceConfig::default(),
        )
    }

    #[test]
    fn full_run_registers_everything() {
        let dir = workdir("full");
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(FakeIlspy::ok(SOURCE)).execute(&mut task).unwrap();

        let section = task.result.find(ASSEMBLY_SECTION_TITLE).unwrap();
        assert_eq!(section.items().len(), 3);
        assert_eq!(section.items()[2], ("InternalsVisibleTo".to_string(), "\"B\"".to_string()));
        assert!(section.subsections.is_empty());

        assert_eq!(task.extracted.len(), 1);
        assert_eq!(task.extracted[0].name, "Sample.decompiled.cs");
        assert_eq!(task.extracted[0].kind, ArtifactKind::Extracted);
        assert_eq!(task.extracted[0].sha256.len(), 64);

        let names: Vec<&str> = task.supplementary.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Sample.il", "project.zip", "Properties/AssemblyInfo.cs", "Sample.csproj"]
        );
        assert_eq!(task.supplementary[1].description, "Project folder");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn stages_run_in_order_with_fixed_flags() {
        let dir = workdir("order");
        let backend = FakeIlspy::ok(SOURCE);
        let calls = Arc::clone(&backend.calls);
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(backend).execute(&mut task).unwrap();

        let calls = calls.lock().unwrap();
        let work = dir.display().to_string();
        let work = work.as_str();
        let project = dir.join("project").display().to_string();
        let project = project.as_str();
        assert_eq!(
            *calls,
            vec![
                vec!["--disable-updatecheck", "--outputdir", work, "/samples/Sample.dll"],
                vec!["--disable-updatecheck", "--ilcode", "--outputdir", work, "/samples/Sample.dll"],
                vec![
                    "--disable-updatecheck",
                    "--project",
                    "--nested-directories",
                    "--outputdir",
                    project,
                    "/samples/Sample.dll",
                ],
            ]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn benign_failures_produce_nothing() {
        for stderr in [
            "Unhandled exception. System.BadImageFormatException: Bad IL format.",
            "PEFileNotSupportedException: PE file does not contain a CLI header",
            "System.NullReferenceException: Object reference not set to an instance of an object.",
            "System.InvalidOperationException: PE file does not contain any managed metadata.",
        ] {
            let dir = workdir("benign");
            let mut task = LocalTask::new("/samples/native.exe", &dir);
            service(FakeIlspy::failing(134, stderr))
                .execute(&mut task)
                .unwrap();
            assert!(task.is_empty(), "expected no output for {stderr}");
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn unknown_failure_carries_stderr() {
        let dir = workdir("unknown");
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        let err = service(FakeIlspy::failing(1, "System.OutOfMemoryException"))
            .execute(&mut task)
            .unwrap_err();
        match err {
            DecompilerError::ToolFailed { exit_code, stderr, .. } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("System.OutOfMemoryException"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(task.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_decompiled_file_is_fatal() {
        let dir = workdir("missing");
        let mut backend = FakeIlspy::ok(SOURCE);
        backend.full = (0, "", None);
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        let err = service(backend).execute(&mut task).unwrap_err();
        assert!(matches!(err, DecompilerError::MissingOutput { .. }));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn il_failure_is_not_fatal() {
        let dir = workdir("il_fail");
        let mut backend = FakeIlspy::ok(SOURCE);
        backend.il_exit = 2;
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(backend).execute(&mut task).unwrap();
        assert!(task.supplementary.iter().all(|a| !a.name.ends_with(".il")));
        assert!(task.supplementary.iter().any(|a| a.name == "project.zip"));
        assert_eq!(task.extracted.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn project_failure_is_not_fatal() {
        let dir = workdir("project_fail");
        let mut backend = FakeIlspy::ok(SOURCE);
        backend.project_exit = 1;
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(backend).execute(&mut task).unwrap();
        let names: Vec<&str> = task.supplementary.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Sample.il"]);
        assert!(!dir.join("project.zip").exists());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn no_attributes_means_no_section() {
        let dir = workdir("no_attrs");
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(FakeIlspy::ok("namespace Sample {}\n"))
            .execute(&mut task)
            .unwrap();
        assert!(task.result.is_empty());
        assert_eq!(task.extracted.len(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn suppress_ildasm_adds_advisory() {
        let dir = workdir("advisory");
        let mut task = LocalTask::new("/samples/Sample.dll", &dir);
        service(FakeIlspy::ok("[assembly: SuppressIldasm]\n[assembly: ComVisible(false)]\n"))
            .execute(&mut task)
            .unwrap();
        let section = task.result.find(ASSEMBLY_SECTION_TITLE).unwrap();
        assert_eq!(section.subsections.len(), 1);
        assert_eq!(section.subsections[0].title, "SuppressIldasm attribute found");
        assert!(matches!(
            &section.subsections[0].body,
            SectionBody::Text(t) if t.contains("may be genuine")
        ));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn sha256_matches_known_digest() {
        let path = std::env::temp_dir().join("dotnet_decompiler_sha256.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let _ = std::fs::remove_file(path);
    }
}
