//! Audit subprocess: run the external audit script with timeout and
//! cooperative shutdown.

use autoremedy_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to wait for the output readers once the process is gone.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditExit {
    Exited,
    TimedOut,
    /// Killed after shutdown was requested and the grace period ran out.
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit: AuditExit,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AuditReport {
    /// Exited on its own with status 0. Only then is the log complete and trusted.
    pub fn success(&self) -> bool {
        self.exit == AuditExit::Exited && self.exit_code == Some(0)
    }

    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::SubprocessFailure { code: self.exit_code, stderr: self.stderr })
        }
    }
}

/// Runs one audit. Implementations must not return before the audit process
/// has exited or been killed.
#[async_trait::async_trait]
pub trait AuditRunner: Send + Sync {
    async fn run_audit(&self, cancel: CancellationToken) -> Result<AuditReport>;
}

pub struct ScriptAuditRunner {
    script: PathBuf,
    workdir: PathBuf,
    timeout: Option<Duration>,
    shutdown_grace: Duration,
}

impl ScriptAuditRunner {
    pub fn new(script: impl Into<PathBuf>, workdir: impl AsRef<Path>) -> Self {
        Self {
            script: script.into(),
            workdir: workdir.as_ref().to_path_buf(),
            timeout: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[async_trait::async_trait]
impl AuditRunner for ScriptAuditRunner {
    /// Spawns the script with no arguments and kill_on_drop(true), then races
    /// its exit against the timeout and the shutdown token. On shutdown the
    /// process gets the grace period before it is killed.
    async fn run_audit(&self, cancel: CancellationToken) -> Result<AuditReport> {
        debug!("audit: {} (cwd {})", self.script.display(), self.workdir.display());
        let started_at = Utc::now();
        let clock = Instant::now();

        // Relative program paths are looked up after the chdir into workdir.
        let script = std::path::absolute(&self.script)?;
        let mut child = Command::new(&script)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes while waiting so a chatty script cannot block on a full pipe.
        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let (exit, status) = tokio::select! {
            result = wait_bounded(&mut child, self.timeout) => result?,
            _ = cancel.cancelled() => {
                info!("Shutdown requested; giving audit up to {}s to finish", self.shutdown_grace.as_secs());
                match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
                    Ok(status) => (AuditExit::Exited, Some(status?)),
                    Err(_) => {
                        warn!("Audit still running after grace period; killing it");
                        let _ = child.kill().await;
                        (AuditExit::Interrupted, None)
                    }
                }
            }
        };

        Ok(AuditReport {
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            exit,
            exit_code: status.and_then(|s| s.code()),
            stdout: join_pipe(stdout).await,
            stderr: join_pipe(stderr).await,
        })
    }
}

async fn wait_bounded(child: &mut Child, timeout: Option<Duration>) -> std::io::Result<(AuditExit, Option<ExitStatus>)> {
    let Some(limit) = timeout else {
        return Ok((AuditExit::Exited, Some(child.wait().await?)));
    };
    match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => Ok((AuditExit::Exited, Some(status?))),
        Err(_) => {
            warn!("Audit timed out after {}s; killing it", limit.as_secs());
            let _ = child.kill().await;
            Ok((AuditExit::TimedOut, None))
        }
    }
}

/// Read all bytes from an optional child pipe into a string.
async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

async fn join_pipe(handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, handle).await {
        Ok(Ok(output)) => output,
        _ => String::new(),
    }
}
