// src/worker.rs
//! The boundary between the host and the sandbox runner.
//!
//! Requests cross it as messages only. With [`Isolation::Process`] each run happens in a
//! child process that is killed when the wall-clock budget runs out; with
//! [`Isolation::Thread`] it happens on a dedicated thread that is abandoned instead.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::errors::{JudgeError, Result};
use crate::models::{RunRequest, RunResponse};
use crate::sandbox::{self, SandboxLimits};

/// Subcommand the binary answers to when spawned as a worker.
pub const WORKER_SUBCOMMAND: &str = "worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    #[default]
    Process,
    Thread,
}

impl std::str::FromStr for Isolation {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(Isolation::Process),
            "thread" => Ok(Isolation::Thread),
            other => Err(JudgeError::Config(format!(
                "unknown isolation mode '{}', expected 'process' or 'thread'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SandboxWorker {
    isolation: Isolation,
    limits: SandboxLimits,
    timeout: Duration,
    program: PathBuf,
}

impl SandboxWorker {
    pub fn new(isolation: Isolation, limits: SandboxLimits, timeout: Duration, program: PathBuf) -> Self {
        Self {
            isolation,
            limits,
            timeout,
            program,
        }
    }

    /// A thread-isolated worker, mostly useful for tests and embedding.
    pub fn in_thread(limits: SandboxLimits, timeout: Duration) -> Self {
        Self::new(Isolation::Thread, limits, timeout, PathBuf::new())
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    /// Sends one request and always yields exactly one response.
    pub async fn execute(&self, request: RunRequest) -> RunResponse {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.dispatch(request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(response)) => {
                log::debug!("Sandbox responded in {}ms (ok={})", elapsed_ms, response.is_ok());
                response
            }
            Ok(Err(e)) => {
                log::error!("Sandbox worker failed after {}ms: {}", elapsed_ms, e);
                RunResponse::failure(e.to_string())
            }
            Err(_) => {
                log::warn!(
                    "Sandbox run exceeded {}ms, terminating {:?} worker",
                    self.timeout.as_millis(),
                    self.isolation
                );
                RunResponse::failure(format!(
                    "Execution timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }

    async fn dispatch(&self, request: RunRequest) -> Result<RunResponse> {
        match self.isolation {
            Isolation::Thread => self.run_in_thread(request).await,
            Isolation::Process => self.run_in_process(request).await,
        }
    }

    async fn run_in_thread(&self, request: RunRequest) -> Result<RunResponse> {
        let (tx, rx) = oneshot::channel();
        let limits = self.limits;

        std::thread::Builder::new()
            .name("sandbox-runner".to_string())
            .spawn(move || {
                let response = sandbox::execute(&request, &limits);
                // The receiver is gone when the host already timed out.
                let _ = tx.send(response);
            })?;

        rx.await
            .map_err(|_| JudgeError::Worker("sandbox thread exited without a response".to_string()))
    }

    async fn run_in_process(&self, request: RunRequest) -> Result<RunResponse> {
        let payload = serde_json::to_vec(&request)?;

        let mut command = Command::new(&self.program);
        command
            .arg(WORKER_SUBCOMMAND)
            .arg("--loop-limit")
            .arg(self.limits.loop_iteration_limit.to_string())
            .arg("--recursion-limit")
            .arg(self.limits.recursion_limit.to_string())
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Ok(filter) = std::env::var("RUST_LOG") {
            command.env("RUST_LOG", filter);
        }

        let mut child = command.spawn().map_err(|e| {
            JudgeError::Worker(format!("failed to spawn {}: {}", self.program.display(), e))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| JudgeError::Worker("worker stdin unavailable".to_string()))?;
        stdin.write_all(&payload).await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if output.stdout.is_empty() {
            return Err(JudgeError::Worker(format!(
                "worker exited with {} and produced no response",
                output.status
            )));
        }

        let response = serde_json::from_slice(&output.stdout)?;
        Ok(response)
    }
}

/// Worker-side half of the process protocol: one request on stdin, one response on stdout.
pub fn serve_stdio(limits: &SandboxLimits) -> Result<()> {
    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input)?;

    let response = match serde_json::from_slice::<RunRequest>(&input) {
        Ok(request) => {
            log::debug!("Worker received {} case(s)", request.cases.len());
            sandbox::execute(&request, limits)
        }
        Err(e) => RunResponse::failure(format!("Malformed run request: {}", e)),
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    stdout.flush()?;
    Ok(())
}

/// Parses `--loop-limit N --recursion-limit M` from the worker's argument list.
pub fn parse_worker_args<I>(args: I) -> Result<SandboxLimits>
where
    I: IntoIterator<Item = String>,
{
    let mut limits = SandboxLimits::default();
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        let value = args
            .next()
            .ok_or_else(|| JudgeError::Config(format!("missing value for {}", flag)))?;
        match flag.as_str() {
            "--loop-limit" => {
                limits.loop_iteration_limit = value
                    .parse()
                    .map_err(|_| JudgeError::Config(format!("invalid loop limit '{}'", value)))?;
            }
            "--recursion-limit" => {
                limits.recursion_limit = value
                    .parse()
                    .map_err(|_| JudgeError::Config(format!("invalid recursion limit '{}'", value)))?;
            }
            other => return Err(JudgeError::Config(format!("unknown worker flag '{}'", other))),
        }
    }

    Ok(limits)
}
