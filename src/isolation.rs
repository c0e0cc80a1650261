//! Isolation boundary: run the worker in a separate process, bounded in time.
//!
//! ## Lifecycle of one request
//!
//! ```text
//! Idle ──▶ Staged ──▶ Launched ──▶ Completed ─┐
//!   │         │           └──────▶ TimedOut ──┼──▶ CleanedUp
//!   │         └──────────────────▶ LaunchFailed┘
//!   └──▶ LaunchFailed (worker not found, nothing staged)
//! ```
//!
//! Once a payload is staged, every path ends in `CleanedUp`. The staged file
//! is owned by a [`StagedPayload`], which removes it explicitly after the
//! worker is gone and again on drop. The drop also runs during unwinding, so
//! a panic between staging and cleanup cannot leak the file.
//!
//! ## What crosses the boundary
//!
//! Parent → worker: the staged file path (one argument) and a whitelisted
//! environment; everything else in the parent's environment is cleared.
//! stdin is `/dev/null`. Worker → parent: stdout, stderr and the exit status.
//! Both output channels are captured up to a byte cap on reader threads, so
//! a chatty worker can neither block on a full pipe nor grow parent memory.
//!
//! ## Timeout
//!
//! The parent polls `try_wait` until the deadline. On expiry it kills the
//! worker and reaps it before returning, so no zombie is left behind.

use crate::config::GateConfig;
use crate::protocol::{
    self, DETAIL_LIMIT, ENV_LOG, WorkerDocument, WorkerExit, truncate_detail,
};
use crate::types::ProcessedResult;
use crate::worker::WorkerSettings;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempPath;

/// Name of the worker executable looked up next to the running binary.
pub const WORKER_BINARY: &str = "pixelgate-worker";

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long to wait for output readers once the worker has exited.
const OUTPUT_GRACE: Duration = Duration::from_secs(1);

/// Result of one isolated worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Success(ProcessedResult),
    UnrecognizedInput,
    ProcessingFailed(String),
    TimedOut,
    LaunchFailed(String),
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Success(_))
    }
}

/// Program (plus leading arguments) used to start a worker.
///
/// The staged payload path is always appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a leading argument (e.g. a script path for an interpreter).
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `pixelgate-worker` in the same directory as the running executable.
    pub fn next_to_current_exe() -> Option<Self> {
        let exe = std::env::current_exe().ok()?;
        let dir = exe.parent()?;
        let name = format!("{WORKER_BINARY}{}", std::env::consts::EXE_SUFFIX);
        Some(Self::new(dir.join(name)))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn exists(&self) -> bool {
        self.program.is_file()
    }
}

/// Exclusively-owned staged copy of one request's bytes.
///
/// The file gets a collision-free random name, so concurrent requests never
/// alias. It is removed by [`StagedPayload::remove`] or, failing that, on drop.
#[derive(Debug)]
pub struct StagedPayload {
    path: TempPath,
}

impl StagedPayload {
    /// Write `bytes` to a fresh file in `dir`. The write handle is closed
    /// before returning, so no open descriptor can leak into the worker.
    pub fn create(dir: &Path, bytes: &[u8]) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pixelgate-")
            .suffix(".img")
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staged file now, reporting any error.
    pub fn remove(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Spawns one worker per request. Holds only read-only configuration.
#[derive(Debug, Clone)]
pub struct IsolationBoundary {
    worker: Option<WorkerCommand>,
    staging_dir: PathBuf,
    settings: WorkerSettings,
    max_output_bytes: usize,
    log_filter: Option<String>,
}

impl IsolationBoundary {
    /// Build a boundary from configuration. The worker program is resolved
    /// here; whether it exists is checked on every [`execute`](Self::execute).
    pub fn new(config: &GateConfig) -> Self {
        let worker = match &config.worker.program {
            Some(program) => Some(WorkerCommand::new(program)),
            None => WorkerCommand::next_to_current_exe(),
        };
        Self {
            worker,
            staging_dir: config
                .worker
                .staging_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            settings: WorkerSettings::from(config),
            max_output_bytes: config.worker.max_output_bytes,
            log_filter: std::env::var(ENV_LOG).ok(),
        }
    }

    /// Boundary with default settings around an explicit worker command.
    pub fn with_worker(worker: WorkerCommand) -> Self {
        Self {
            worker: Some(worker),
            ..Self::new(&GateConfig::default())
        }
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = limit.max(1);
        self
    }

    pub fn worker(&self) -> Option<&WorkerCommand> {
        self.worker.as_ref()
    }

    /// Stage `bytes`, run the worker on them, and clean up.
    ///
    /// Blocks for at most `timeout` plus a bounded grace period for output
    /// collection. On return no staged file remains. A `timeout` too large to
    /// form a deadline is a launch failure; nothing is staged or spawned.
    pub fn execute(&self, bytes: &[u8], timeout: Duration) -> WorkerOutcome {
        let Some(worker) = self.worker.as_ref().filter(|w| w.exists()) else {
            tracing::warn!(worker = ?self.worker, "worker program not found");
            return WorkerOutcome::LaunchFailed("worker not found".to_string());
        };

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            tracing::warn!(timeout_secs = timeout.as_secs(), "timeout out of range");
            return WorkerOutcome::LaunchFailed(format!("timeout out of range: {timeout:?}"));
        };

        let staged = match StagedPayload::create(&self.staging_dir, bytes) {
            Ok(staged) => staged,
            Err(e) => {
                tracing::warn!(dir = %self.staging_dir.display(), error = %e, "staging failed");
                return WorkerOutcome::LaunchFailed(format!("cannot stage payload: {e}"));
            }
        };
        tracing::debug!(path = %staged.path().display(), len = bytes.len(), "payload staged");

        let outcome = self.launch(worker, &staged, deadline, timeout);

        if let Err(e) = staged.remove() {
            tracing::warn!(error = %e, "failed to remove staged payload");
        }
        outcome
    }

    fn launch(
        &self,
        worker: &WorkerCommand,
        staged: &StagedPayload,
        deadline: Instant,
        timeout: Duration,
    ) -> WorkerOutcome {
        let mut command = Command::new(&worker.program);
        command
            .args(&worker.args)
            .arg(staged.path())
            .env_clear()
            .envs(self.settings.to_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(filter) = &self.log_filter {
            command.env(ENV_LOG, filter);
        }

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %worker.program.display(), error = %e, "worker spawn failed");
                return WorkerOutcome::LaunchFailed(format!("cannot start worker: {e}"));
            }
        };
        tracing::debug!(pid = child.id(), "worker launched");

        let stdout = spawn_reader(child.stdout.take(), self.max_output_bytes);
        let stderr = spawn_reader(child.stderr.take(), self.max_output_bytes);

        match wait_until(&mut child, deadline) {
            Ok(Some(status)) => {
                let stdout = collect(&stdout);
                let stderr = collect(&stderr);
                tracing::debug!(
                    status = ?status.code(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "worker exited"
                );
                interpret(status, &stdout, &stderr)
            }
            Ok(None) => {
                kill_and_reap(&mut child);
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "worker timed out");
                WorkerOutcome::TimedOut
            }
            Err(e) => {
                kill_and_reap(&mut child);
                WorkerOutcome::ProcessingFailed(format!("cannot wait for worker: {e}"))
            }
        }
    }
}

/// Poll until the child exits or `deadline` passes (`Ok(None)`).
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "kill failed (worker may have exited)");
    }
    if let Err(e) = child.wait() {
        tracing::warn!(error = %e, "failed to reap worker");
    }
}

/// Read up to `limit` bytes on a background thread, then drain the rest.
fn spawn_reader<R>(stream: Option<R>, limit: usize) -> mpsc::Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    if let Some(mut stream) = stream {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stream.by_ref().take(limit as u64).read_to_end(&mut buffer);
            let _ = io::copy(&mut stream, &mut io::sink());
            let _ = tx.send(buffer);
        });
    }
    rx
}

fn collect(rx: &mpsc::Receiver<Vec<u8>>) -> String {
    let bytes = rx.recv_timeout(OUTPUT_GRACE).unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Map exit status and captured output to an outcome.
fn interpret(status: ExitStatus, stdout: &str, stderr: &str) -> WorkerOutcome {
    let Some(code) = status.code() else {
        return WorkerOutcome::ProcessingFailed(signal_detail(status));
    };

    match WorkerExit::from_code(code) {
        Some(WorkerExit::Success) => match protocol::parse_document(stdout) {
            Ok(WorkerDocument::Success(result)) => WorkerOutcome::Success(result),
            Ok(WorkerDocument::Failure(_)) => WorkerOutcome::ProcessingFailed(
                "protocol violation: error document with zero exit status".to_string(),
            ),
            Err(e) => WorkerOutcome::ProcessingFailed(truncate_detail(
                &format!("protocol violation: {e}"),
                DETAIL_LIMIT,
            )),
        },
        Some(WorkerExit::Unrecognized) => WorkerOutcome::UnrecognizedInput,
        _ => WorkerOutcome::ProcessingFailed(failure_detail(code, stdout, stderr)),
    }
}

/// Best-effort diagnostic: stderr first, then the worker's own detail, then the code.
fn failure_detail(code: i32, stdout: &str, stderr: &str) -> String {
    if !stderr.trim().is_empty() {
        return truncate_detail(stderr, DETAIL_LIMIT);
    }
    if let Ok(WorkerDocument::Failure(err)) = protocol::parse_document(stdout) {
        if let Some(detail) = err.detail {
            return truncate_detail(&detail, DETAIL_LIMIT);
        }
    }
    format!("worker exited with status {code}")
}

#[cfg(unix)]
fn signal_detail(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("worker terminated by signal {signal}"),
        None => "worker terminated abnormally".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_detail(_status: ExitStatus) -> String {
    "worker terminated abnormally".to_string()
}
