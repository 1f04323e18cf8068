// FILE: src/probe/runner.rs
//! Process execution facility for probe batches.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{CockpitError, Result};

/// Collected output of one finished probe process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    pub stdout: String,
    pub exit_code: Option<i32>,
}

pub type ProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeOutput>> + Send + 'static>>;

/// Runs a probe command asynchronously. Dropping the returned future must
/// terminate the underlying process.
pub trait ProbeRunner: Send + Sync + 'static {
    fn run(&self, command: String) -> ProbeFuture;
}

/// Kills a probe's whole process group when dropped, so `ping` children
/// of the shell die with it.
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            tracing::debug!("[Prober] Killing probe process group {}", pgid);
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
}

/// Runs probe batches through `sh -c` in a fresh process group. Stderr is
/// logged line by line and never returned.
#[derive(Debug, Clone, Default)]
pub struct ShellProbeRunner;

impl ProbeRunner for ShellProbeRunner {
    fn run(&self, command: String) -> ProbeFuture {
        Box::pin(async move {
            tracing::debug!("[Prober] Executing: {}", command);

            let mut child = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .process_group(0)
                .kill_on_drop(true)
                .spawn()?;
            let mut group = ProcessGroup::new(child.id());

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| CockpitError::Probe("stdout not captured".into()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| CockpitError::Probe("stderr not captured".into()))?;

            let collect_stdout = async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut collected = String::new();
                while let Some(line) = lines.next_line().await? {
                    collected.push_str(&line);
                    collected.push('\n');
                }
                Ok::<_, std::io::Error>(collected)
            };

            let log_stderr = async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::info!("[Prober] stderr: {}", line);
                }
            };

            let (stdout, ()) = tokio::join!(collect_stdout, log_stderr);
            let stdout = stdout?;
            let status = child.wait().await?;
            group.disarm();
            tracing::debug!("[Prober] Probe exited with {}", status);

            Ok::<_, CockpitError>(ProbeOutput {
                stdout,
                exit_code: status.code(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_collects_stdout() {
        let output = ShellProbeRunner
            .run("echo 'PING 10.0.0.5'; echo oops >&2; exit 1".to_string())
            .await
            .unwrap();
        assert_eq!(output.stdout, "PING 10.0.0.5\n");
        assert_eq!(output.exit_code, Some(1));
    }

    fn is_gone(pid: libc::pid_t) -> bool {
        if unsafe { libc::kill(pid, 0) } != 0 {
            return true;
        }
        // reparented zombies count as dead
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| stat.rsplit(')').next().map(|rest| rest.trim_start().starts_with('Z')))
            .ok()
            .flatten()
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn test_dropped_probe_kills_shell_children() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");
        let command = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

        let probe = ShellProbeRunner.run(command);
        let result = tokio::time::timeout(std::time::Duration::from_millis(300), probe).await;
        assert!(result.is_err());

        let pid: libc::pid_t = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let mut gone = false;
        for _ in 0..40 {
            if is_gone(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(gone, "child {} outlived its probe", pid);
    }

    #[tokio::test]
    async fn test_dropped_probe_is_killed() {
        let probe = ShellProbeRunner.run("sleep 5".to_string());
        let result = tokio::time::timeout(std::time::Duration::from_millis(50), probe).await;
        assert!(result.is_err());
    }
}
