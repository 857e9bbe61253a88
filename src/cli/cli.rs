use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::DecompilerError;
use crate::modules::dotnet::{
    ArtifactDescriptor, DecompilerBackend, DotnetDecompiler, IlspyBackend, LocalTask,
    ResultSection, SectionBody, ServiceConfig, SignatureLibrary,
};

// logging
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dotnet-decompiler", about = ".NET decompilation service", version)]
pub struct Cli {
    /// global log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decompile one file and report attributes and artifacts
    Run {
        /// file to decompile
        #[arg(long)]
        input: PathBuf,
        /// scratch directory for decompiler output
        #[arg(long)]
        workdir: PathBuf,
        /// service config file (yaml/json)
        #[arg(long)]
        config: Option<PathBuf>,
        /// failure signature file (yaml/json)
        #[arg(long)]
        rules: Option<PathBuf>,
        /// decompiler executable name or path
        #[arg(long)]
        program: Option<String>,
        /// per-invocation timeout in seconds (0 disables)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// output format: raw/json
        #[arg(long, default_value = "raw")]
        output: String,
        /// write output to file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check whether the decompiler executable can be found
    Probe {
        #[arg(long)]
        program: Option<String>,
    },
    /// Write the default failure signature library
    RulesTemplate {
        #[arg(long)]
        out: PathBuf,
    },
}

fn format_task(task: &LocalTask, fmt: &str) -> Result<String, DecompilerError> {
    if fmt.eq_ignore_ascii_case("json") {
        return serde_json::to_string_pretty(task)
            .map_err(|e| DecompilerError::ParseError(e.to_string()));
    }
    let mut lines = Vec::new();
    for section in &task.result.sections {
        push_section(&mut lines, section, 0);
    }
    for a in &task.extracted {
        lines.push(format_artifact("extracted", a));
    }
    for a in &task.supplementary {
        lines.push(format_artifact("supplementary", a));
    }
    if lines.is_empty() {
        lines.push("no result".to_string());
    }
    Ok(lines.join("\n"))
}

fn push_section(lines: &mut Vec<String>, section: &ResultSection, depth: usize) {
    let indent = "  ".repeat(depth);
    lines.push(format!("{}[{}]", indent, section.title));
    match &section.body {
        SectionBody::OrderedKeyValue(items) => {
            for (k, v) in items {
                lines.push(format!("{}  {}: {}", indent, k, v));
            }
        }
        SectionBody::Text(t) => lines.push(format!("{}  {}", indent, t)),
    }
    for sub in &section.subsections {
        push_section(lines, sub, depth + 1);
    }
}

fn format_artifact(kind: &str, a: &ArtifactDescriptor) -> String {
    format!(
        "{} name={} description={} sha256={} path={}",
        kind,
        a.name,
        a.description,
        a.sha256,
        a.path.display()
    )
}

async fn write_output(out: Option<PathBuf>, s: &str) -> Result<(), DecompilerError> {
    match out {
        Some(path) => {
            let mut file = File::create(path).await?;
            file.write_all(format!("{}\n", s).as_bytes()).await?;
        }
        None => println!("{}", s),
    }
    Ok(())
}

/// File values, then the environment, then flags. A zero timeout disables it.
fn resolve_config(
    config: Option<PathBuf>,
    rules: Option<PathBuf>,
    program: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<ServiceConfig, DecompilerError> {
    let mut cfg = match config {
        Some(path) => ServiceConfig::load(&path)?,
        None => ServiceConfig::default(),
    }
    .with_env_overrides();
    if let Some(r) = rules { cfg.rules_path = Some(r); }
    if let Some(p) = program { cfg.program = p; }
    if let Some(t) = timeout_secs { cfg.timeout_secs = (t > 0).then_some(t); }
    Ok(cfg)
}

pub async fn run_from_args<I, T>(args: I) -> Result<(), DecompilerError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // initialize tracing according to log_level (ok if already initialized in tests)
    let env_filter = EnvFilter::new(cli.log_level.clone());
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    info!("Starting dotnet-decompiler, log_level={}", cli.log_level);

    match cli.cmd {
        Commands::Run { input, workdir, config, rules, program, timeout_secs, output, out } => {
            let cfg = resolve_config(config, rules, program, timeout_secs)?;

            // the service blocks on child processes; keep it off the async workers
            let task = tokio::task::spawn_blocking(move || {
                let service = DotnetDecompiler::from_config(cfg)?;
                let mut task = LocalTask::new(input, workdir);
                service.execute(&mut task)?;
                Ok::<_, DecompilerError>(task)
            })
            .await
            .map_err(|e| DecompilerError::Generic(format!("decompile task panicked: {}", e)))??;

            let s = format_task(&task, &output)?;
            write_output(out, &s).await?;
        }
        Commands::Probe { program } => {
            let program = program.unwrap_or_else(|| ServiceConfig::default().program);
            let backend = IlspyBackend::detect(&program);
            let s = serde_json::to_string(backend.binary())
                .map_err(|e| DecompilerError::ParseError(e.to_string()))?;
            println!("{}", s);
        }
        Commands::RulesTemplate { out } => {
            SignatureLibrary::write_template(&out)?;
            info!("signature template written to {}", out.display());
        }
    }

    Ok(())
}

/// Run using environment args
pub async fn run() -> Result<(), DecompilerError> {
    run_from_args(std::env::args()).await
}
