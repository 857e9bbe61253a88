use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::errors::DecompilerError;
use crate::modules::dotnet::model::{InvocationResult, ToolInvocation};

use super::{BackendBinary, DecompilerBackend};

/// Runs `ilspycmd` as a child process and captures its output.
pub struct IlspyBackend {
    binary: BackendBinary,
    timeout: Option<Duration>,
}

impl IlspyBackend {
    pub fn new(binary: BackendBinary) -> Self {
        Self {
            binary,
            timeout: None,
        }
    }

    pub fn detect(program: &str) -> Self {
        Self::new(BackendBinary::probe(program))
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout = timeout_secs.map(|s| Duration::from_secs(s.max(1)));
        self
    }
}

impl DecompilerBackend for IlspyBackend {
    fn name(&self) -> &'static str {
        "ilspy"
    }

    fn binary(&self) -> &BackendBinary {
        &self.binary
    }

    fn run(&self, plan: &ToolInvocation) -> Result<InvocationResult, DecompilerError> {
        debug!(program = %plan.program, args = ?plan.args, "launching decompiler");
        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DecompilerError::ToolLaunch {
                program: plan.program.clone(),
                source: e,
            })?;

        // drain both pipes so a chatty child never blocks on a full buffer
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let exit_code = wait_with_timeout(&mut child, &plan.program, self.timeout)?;
        Ok(InvocationResult {
            exit_code,
            stdout: join_drain(stdout),
            stderr: join_drain(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn wait_with_timeout(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
) -> Result<Option<i32>, DecompilerError> {
    let Some(timeout) = timeout else {
        let status = child.wait()?;
        return Ok(status.code());
    };

    let started = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(status.code()),
            None => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DecompilerError::Timeout {
                        program: program.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}
