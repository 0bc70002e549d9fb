//! Establishing the connection and owning the debuggee process.
//!
//! With a debug listener script the debuggee connects back to us: a
//! loopback socket is bound on an ephemeral port, the port is passed to the
//! child and exactly one connection is accepted. Without one, node is
//! started with `--debug-brk=<port>` and we connect to it once it listens.
//! Either way the connection is attached in the background, so commands
//! issued meanwhile are queued by the [`Connection`].

use std::{
    net::SocketAddr,
    process::ExitStatus,
    sync::Arc,
    time::{Duration, Instant},
};

use server::{Debuggee, LaunchArguments, OutputLine};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    connection::{Connection, Inbound},
    error::SessionError,
};

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the background tasks that connect to, and watch, the debuggee.
/// Dropping it kills a launched debuggee.
pub struct Listener {
    port: u16,
    process_id: Option<u32>,
    cancel: CancellationToken,
}

impl Listener {
    /// Spawn the debuggee described by `arguments` and connect to it in the
    /// background.
    pub(crate) async fn launch(
        arguments: &LaunchArguments,
        connection: Arc<Connection>,
        attach_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let cancel = CancellationToken::new();

        let (debuggee, output, port) = if arguments.connects_back() {
            let socket = TcpListener::bind("127.0.0.1:0").await?;
            let port = socket.local_addr()?.port();
            let (debuggee, output) = spawn(arguments, port)?;
            tokio::spawn(accept(socket, Arc::clone(&connection), cancel.clone()));
            (debuggee, output, port)
        } else {
            let port = transport::get_random_tcp_port()?;
            let (debuggee, output) = spawn(arguments, port)?;
            let addr = SocketAddr::from(([127, 0, 0, 1], port));
            tokio::spawn(connect_with_retry(
                addr,
                attach_timeout,
                Arc::clone(&connection),
                cancel.clone(),
            ));
            (debuggee, output, port)
        };

        let process_id = debuggee.id();
        tracing::debug!(port, ?process_id, "debuggee started");
        tokio::spawn(relay_output(output, Arc::clone(&connection)));
        tokio::spawn(watch(debuggee, connection, cancel.clone()));

        Ok(Self {
            port,
            process_id,
            cancel,
        })
    }

    /// Connect to a debuggee that is already listening on `addr`.
    pub(crate) async fn attach_to(
        addr: SocketAddr,
        connection: Arc<Connection>,
        attach_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let stream = connect_until(addr, attach_timeout, &connection).await?;
        connection.attach(stream).await?;
        Ok(Self {
            port: addr.port(),
            process_id: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The launched debuggee's process id.
    pub fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Stop the background tasks and kill a launched debuggee.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn spawn(
    arguments: &LaunchArguments,
    port: u16,
) -> Result<(Debuggee, mpsc::UnboundedReceiver<OutputLine>), SessionError> {
    Debuggee::spawn(arguments, port).map_err(|e| SessionError::Launch(format!("{e:#}")))
}

async fn accept(socket: TcpListener, connection: Arc<Connection>, cancel: CancellationToken) {
    let accepted = tokio::select! {
        _ = cancel.cancelled() => return,
        _ = connection.closed() => return,
        accepted = socket.accept() => accepted,
    };
    match accepted {
        Ok((stream, peer)) => {
            tracing::debug!(%peer, "debuggee connected");
            if let Err(e) = connection.attach(stream).await {
                tracing::warn!(error = %e, "attaching to debuggee");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "accepting debuggee connection");
            connection.close(SessionError::Io(e)).await;
            connection.forward(Inbound::Disconnected);
        }
    }
}

async fn connect_with_retry(
    addr: SocketAddr,
    timeout: Duration,
    connection: Arc<Connection>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        connected = connect_until(addr, timeout, &connection) => connected,
    };
    let result = match connected {
        Ok(stream) => connection.attach(stream).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, %addr, "could not connect to debuggee");
        if connection.close(e).await {
            connection.forward(Inbound::Disconnected);
        }
    }
}

/// Keep trying to connect until the debuggee listens, the connection is
/// closed (the process exited) or `timeout` passes.
async fn connect_until(
    addr: SocketAddr,
    timeout: Duration,
    connection: &Connection,
) -> Result<TcpStream, SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() >= deadline => {
                return Err(SessionError::Launch(format!(
                    "could not connect to the debuggee at {addr}: {e}"
                )));
            }
            Err(e) => tracing::trace!(error = %e, %addr, "debuggee not listening yet"),
        }
        if connection.is_closed() {
            return Err(SessionError::Disconnected);
        }
        tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
    }
}

async fn relay_output(mut output: mpsc::UnboundedReceiver<OutputLine>, connection: Arc<Connection>) {
    while let Some(line) = output.recv().await {
        connection.forward(Inbound::ProcessOutput(line));
    }
}

async fn watch(mut debuggee: Debuggee, connection: Arc<Connection>, cancel: CancellationToken) {
    tokio::select! {
        status = debuggee.wait() => {
            let (exit_code, message) = match status {
                Ok(status) => (status.code(), exit_message(status)),
                Err(e) => (None, format!("The process could not be monitored: {e}")),
            };
            connection.process_exited(exit_code, message).await;
        }
        _ = cancel.cancelled() => {
            debuggee.kill();
            let _ = debuggee.wait().await;
            connection.close(SessionError::Disconnected).await;
        }
    }
}

fn exit_message(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("The process has exited with code {code}."),
        None => format!("The process has exited ({status})."),
    }
}
