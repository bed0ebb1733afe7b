//! [`ProcessLauncher`] backed by `tokio::process`.
//!
//! On Unix every supervised process is the leader of its own process group,
//! so terminate and kill reach the whole tree (`go run` and `flutter run`
//! both fork the real server or app as a child).

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::domain::errors::{CommandError, SupervisorError};
use crate::domain::models::LaunchSpec;
use crate::domain::ports::{CommandOutput, OutputStream, ProcessExit, ProcessHandle, ProcessLauncher};

/// Lines buffered between the pipe readers and the log monitor.
const OUTPUT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub const fn new() -> Self {
        Self
    }
}

fn command_for(spec: &LaunchSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).envs(&spec.env).stdin(Stdio::null());
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn spawn(
        &self,
        service: &str,
        spec: &LaunchSpec,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        let mut cmd = command_for(spec);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| SupervisorError::Spawn {
            service: service.to_string(),
            reason: format!("`{}`: {e}", spec.command_line()),
        })?;

        let pid = child.id();
        info!(service, pid = ?pid, command = %spec.command_line(), "process spawned");

        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx));
        }

        Ok(Box::new(TokioProcessHandle {
            child,
            pid,
            output: Some(rx),
        }))
    }

    async fn run(&self, spec: &LaunchSpec, timeout: Duration) -> Result<CommandOutput, CommandError> {
        let mut cmd = command_for(spec);
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %spec.command_line(), ?timeout, "running command");
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| CommandError::TimedOut {
                command: spec.command_line(),
                timeout,
            })?
            .map_err(|source| CommandError::Io {
                command: spec.command_line(),
                source,
            })?;

        Ok(CommandOutput {
            exit: ProcessExit::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Read `pipe` line by line into `tx`. Invalid UTF-8 is replaced, not fatal.
async fn forward_lines<R>(pipe: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                trace!(error = %e, "output pipe read failed");
                break;
            }
        }
    }
}

pub struct TokioProcessHandle {
    child: Child,
    pid: Option<u32>,
    output: Option<OutputStream>,
}

impl TokioProcessHandle {
    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Ok(());
        };
        let pgid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        match nix::sys::signal::killpg(Pid::from_raw(pgid), signal) {
            // Group already gone.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

#[async_trait]
impl ProcessHandle for TokioProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn take_output(&mut self) -> Option<OutputStream> {
        self.output.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.child.try_wait()?.map(ProcessExit::from))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        self.signal_group(nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn kill(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL)?;

        match self.child.start_kill() {
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        Ok(ProcessExit::from(self.child.wait().await?))
    }
}
