//! Races a spawned shell command's completion against a wait budget,
//! transparently backgrounding it on timeout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;

use super::buffer::OutputBuffer;
use super::ProcessError;

const STATUS_TAIL_BYTES: usize = 2 * 1024;
const COMMAND_DISPLAY_LEN: usize = 60;

/// Outcome of racing a command against `wait_ms`.
#[derive(Debug, Clone)]
pub struct ShellResult {
    pub completed: bool,
    pub output: String,
    pub exit_code: Option<i32>,
    pub pid: u32,
}

/// Snapshot of a tracked process, for `shell_status`.
#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub pid: u32,
    pub command: String,
    pub running: bool,
    pub elapsed: Duration,
    pub tail: String,
}

struct Tracked {
    command: String,
    started_at: Instant,
    buffer: Arc<AsyncMutex<OutputBuffer>>,
    exit_code: Arc<AsyncMutex<Option<i32>>>,
    child: Arc<AsyncMutex<Child>>,
}

pub struct ProcessManager {
    working_dir: PathBuf,
    tracked: AsyncMutex<HashMap<u32, Tracked>>,
}

impl ProcessManager {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            tracked: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Spawn `command` under `sh -c`, race its completion against `wait_ms`.
    pub async fn run(&self, command: &str, wait_ms: u64) -> Result<ShellResult, ProcessError> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .env("TERM", "dumb")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(ProcessError::Spawn)?;

        let pid = child.id().ok_or(ProcessError::NoPid)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::Spawn(std::io::Error::other("child spawned without piped stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::Spawn(std::io::Error::other("child spawned without piped stderr")))?;

        let buffer = Arc::new(AsyncMutex::new(OutputBuffer::default()));
        spawn_reader(stdout, buffer.clone());
        spawn_reader(stderr, buffer.clone());

        let child = Arc::new(AsyncMutex::new(child));
        let exit_code = Arc::new(AsyncMutex::new(None));

        let wait_result = {
            let child = child.clone();
            tokio::select! {
                status = wait_for(child) => Some(status),
                _ = sleep(Duration::from_millis(wait_ms)) => None,
            }
        };

        match wait_result {
            Some(status) => {
                let code = status.map_err(ProcessError::Wait)?.code();
                *exit_code.lock().await = code;
                let mut output = buffer.lock().await.as_str();
                if let Some(c) = code {
                    if c != 0 {
                        output.push_str(&format!("\nexit code: {c}\n"));
                    }
                }
                Ok(ShellResult {
                    completed: true,
                    output,
                    exit_code: code,
                    pid,
                })
            }
            None => {
                let partial = buffer.lock().await.as_str();
                let tracked = Tracked {
                    command: command.to_string(),
                    started_at: Instant::now(),
                    buffer: buffer.clone(),
                    exit_code: exit_code.clone(),
                    child: child.clone(),
                };
                self.tracked.lock().await.insert(pid, tracked);
                spawn_exit_watcher(pid, child, exit_code);
                Ok(ShellResult {
                    completed: false,
                    output: partial,
                    exit_code: None,
                    pid,
                })
            }
        }
    }

    pub async fn status(&self, pid: u32) -> Result<ProcessStatus, ProcessError> {
        let guard = self.tracked.lock().await;
        let t = guard.get(&pid).ok_or(ProcessError::NotFound(pid))?;
        let running = t.exit_code.lock().await.is_none();
        Ok(ProcessStatus {
            pid,
            command: truncate(&t.command, COMMAND_DISPLAY_LEN),
            running,
            elapsed: t.started_at.elapsed(),
            tail: t.buffer.lock().await.tail(STATUS_TAIL_BYTES),
        })
    }

    pub async fn output(&self, pid: u32) -> Result<(String, Option<i32>), ProcessError> {
        let guard = self.tracked.lock().await;
        let t = guard.get(&pid).ok_or(ProcessError::NotFound(pid))?;
        Ok((t.buffer.lock().await.as_str(), *t.exit_code.lock().await))
    }

    pub async fn tail(&self, pid: u32, n: usize) -> Result<String, ProcessError> {
        let guard = self.tracked.lock().await;
        let t = guard.get(&pid).ok_or(ProcessError::NotFound(pid))?;
        Ok(t.buffer.lock().await.tail(n))
    }

    pub async fn kill(&self, pid: u32) -> Result<bool, ProcessError> {
        let guard = self.tracked.lock().await;
        match guard.get(&pid) {
            Some(t) => {
                let _ = t.child.lock().await.start_kill();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn list(&self) -> Vec<ProcessStatus> {
        let guard = self.tracked.lock().await;
        let mut out = Vec::with_capacity(guard.len());
        for (pid, t) in guard.iter() {
            let running = t.exit_code.lock().await.is_none();
            out.push(ProcessStatus {
                pid: *pid,
                command: truncate(&t.command, COMMAND_DISPLAY_LEN),
                running,
                elapsed: t.started_at.elapsed(),
                tail: t.buffer.lock().await.tail(STATUS_TAIL_BYTES),
            });
        }
        out
    }

    /// Terminate every tracked running process on clean shutdown.
    pub async fn kill_all(&self) {
        let guard = self.tracked.lock().await;
        for t in guard.values() {
            let _ = t.child.lock().await.start_kill();
        }
    }
}

async fn wait_for(child: Arc<AsyncMutex<Child>>) -> std::io::Result<std::process::ExitStatus> {
    child.lock().await.wait().await
}

fn spawn_reader<R>(mut reader: R, buffer: Arc<AsyncMutex<OutputBuffer>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.lock().await.append(&chunk[..n]),
            }
        }
    });
}

fn spawn_exit_watcher(
    _pid: u32,
    child: Arc<AsyncMutex<Child>>,
    exit_code: Arc<AsyncMutex<Option<i32>>>,
) {
    tokio::spawn(async move {
        if let Ok(status) = child.lock().await.wait().await {
            *exit_code.lock().await = status.code();
        }
    });
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('\u{2026}');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_wait_budget() {
        let mgr = ProcessManager::new(PathBuf::from("."));
        let result = mgr.run("echo done", 2000).await.unwrap();
        assert!(result.completed);
        assert!(result.output.contains("done"));
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn backgrounds_on_timeout_then_reports_completion() {
        let mgr = ProcessManager::new(PathBuf::from("."));
        let result = mgr.run("sleep 0.2 && echo finished", 10).await.unwrap();
        assert!(!result.completed);
        let pid = result.pid;

        tokio::time::sleep(Duration::from_millis(500)).await;
        let (output, code) = mgr.output(pid).await.unwrap();
        assert!(output.contains("finished"));
        assert_eq!(code, Some(0));
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_appended_to_output() {
        let mgr = ProcessManager::new(PathBuf::from("."));
        let result = mgr.run("exit 7", 2000).await.unwrap();
        assert_eq!(result.exit_code, Some(7));
        assert!(result.output.contains("exit code: 7"));
    }

    #[tokio::test]
    async fn status_unknown_pid_errors() {
        let mgr = ProcessManager::new(PathBuf::from("."));
        assert!(mgr.status(999_999).await.is_err());
    }

    #[tokio::test]
    async fn kill_returns_false_when_not_tracked() {
        let mgr = ProcessManager::new(PathBuf::from("."));
        assert!(!mgr.kill(999_999).await.unwrap());
    }
}
