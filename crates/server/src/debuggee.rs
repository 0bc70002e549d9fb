use std::{io, process::ExitStatus, process::Stdio};

use eyre::WrapErr;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::mpsc,
};

use crate::LaunchArguments;

/// A line written by the debuggee outside the debugger protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// A running debuggee process.
///
/// The process is killed when this value is dropped.
pub struct Debuggee {
    child: Child,
}

impl Debuggee {
    /// Spawn node for a debug session on `port`.
    ///
    /// Must be called from within a tokio runtime. Returns the process and a
    /// channel carrying its stdout and stderr, line by line.
    pub fn spawn(
        arguments: &LaunchArguments,
        port: u16,
    ) -> eyre::Result<(Self, mpsc::UnboundedReceiver<OutputLine>)> {
        let node = arguments.resolve_node()?;
        let command_arguments = arguments.command_arguments(port);
        tracing::debug!(node = %node.display(), ?command_arguments, "starting debuggee process");

        let mut command = Command::new(&node);
        command
            .args(&command_arguments)
            .envs(&arguments.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &arguments.working_directory {
            command.current_dir(cwd);
        }
        if let Some(node_path) = arguments.effective_node_path() {
            command.env("NODE_PATH", node_path);
        }

        let mut child = command
            .spawn()
            .wrap_err_with(|| format!("spawning {}", node.display()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| eyre::eyre!("debuggee stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| eyre::eyre!("debuggee stderr was not captured"))?;
        tokio::spawn(relay_lines(stdout, tx.clone(), OutputLine::Stdout));
        tokio::spawn(relay_lines(stderr, tx, OutputLine::Stderr));

        Ok((Self { child }, rx))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Signal the process to terminate, tolerating a process that has
    /// already exited.
    pub fn kill(&mut self) {
        tracing::debug!("terminating debuggee");
        match self.child.start_kill() {
            Ok(()) => tracing::debug!("debuggee terminated"),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                tracing::debug!("debuggee already exited")
            }
            Err(e) => tracing::warn!(error = %e, "could not terminate debuggee process"),
        }
    }
}

impl Drop for Debuggee {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.kill();
        }
    }
}

/// Relay `reader` line by line. Invalid UTF-8 is replaced rather than
/// ending the relay, so the pipe keeps draining.
async fn relay_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = strip_line_ending(&buf);
                if tx.send(wrap(String::from_utf8_lossy(line).into_owned())).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reading debuggee output");
                break;
            }
        }
    }
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
