//! The connection to the debuggee.
//!
//! All mutable connection state sits behind one lock: the writer, the
//! requests issued before the debuggee connected, the single queued
//! execution, the outstanding execution completion and the pending request
//! table. The lock is held across bookkeeping and socket writes, never
//! across the wait for a response.
//!
//! A single reader task dispatches inbound messages in arrival order:
//! responses complete their pending request, `execute` packets complete the
//! outstanding execution, events and output are forwarded as [`Inbound`].
//! A malformed packet fails at most the request it answers; only transport
//! errors close the connection.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use serde_json::Value;
use server::OutputLine;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Mutex, mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use transport::{
    Execute, Message, MessageCodec, MessageReader, MessageWriter, OutgoingMessage, Request,
    Response, Transport,
};

use crate::{
    error::{CommandError, DebuggerError, SessionError},
    pending_requests::PendingRequests,
    types::ExecutionOutcome,
};

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type ExecuteSender = oneshot::Sender<Result<ExecutionOutcome, SessionError>>;

/// Traffic for the session's event loop.
#[derive(Debug)]
pub(crate) enum Inbound {
    Connected,
    Event(transport::Event),
    /// `output` or `outputerror` packets from the listener script.
    Output { text: String, error: bool },
    /// A line the debuggee process wrote to stdout or stderr.
    ProcessOutput(OutputLine),
    Disconnected,
    ProcessExited {
        exit_code: Option<i32>,
        message: String,
    },
}

#[derive(Default)]
struct State {
    writer: Option<MessageWriter<BoxedWrite>>,
    backlog: Vec<Request>,
    queued_execute: Option<String>,
    execute_completion: Option<ExecuteSender>,
    pending: PendingRequests,
    closed: Option<SessionError>,
}

pub(crate) struct Connection {
    state: Mutex<State>,
    inbound: mpsc::UnboundedSender<Inbound>,
    command_timeout: Option<Duration>,
    max_message_size: usize,
    /// Cancelled once the connection is closed for good.
    closed: CancellationToken,
}

impl Connection {
    pub(crate) fn new(
        command_timeout: Option<Duration>,
        max_message_size: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Inbound>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            state: Mutex::new(State::default()),
            inbound,
            command_timeout,
            max_message_size,
            closed: CancellationToken::new(),
        });
        (connection, rx)
    }

    /// Start using `transport`: flush everything queued while unconnected,
    /// then start the reader task.
    pub(crate) async fn attach<T: Transport>(self: &Arc<Self>, transport: T) -> Result<(), SessionError> {
        let (read, write) = transport.into_split();
        let reader =
            MessageReader::with_codec(read, MessageCodec::with_max_size(self.max_message_size));
        let mut writer = MessageWriter::new(Box::new(write) as BoxedWrite);

        let mut state = self.state.lock().await;
        if let Some(reason) = &state.closed {
            return Err(reason.duplicate());
        }
        if state.writer.is_some() {
            return Err(SessionError::Launch("already connected".to_string()));
        }

        let backlog = std::mem::take(&mut state.backlog);
        let queued_execute = state.queued_execute.take();
        tracing::debug!(
            queued_requests = backlog.len(),
            queued_execute = queued_execute.is_some(),
            "connected to debuggee"
        );
        let outgoing = backlog
            .into_iter()
            .map(OutgoingMessage::Request)
            .chain(queued_execute.map(|code| OutgoingMessage::Execute(Execute::code(code))));
        for message in outgoing {
            if let Err(e) = writer.send(message).await {
                tracing::error!(error = %e, "flushing queued messages");
                let reason = SessionError::Transport(e);
                self.close_locked(&mut state, reason.duplicate());
                return Err(reason);
            }
        }
        state.writer = Some(writer);
        drop(state);

        let _ = self.inbound.send(Inbound::Connected);
        tokio::spawn(Arc::clone(self).read_loop(reader));
        Ok(())
    }

    /// Send a request and wait for its response.
    pub(crate) async fn request(&self, request: Request) -> Result<Response, DebuggerError> {
        let seq = request.seq;
        let command = request.command.clone();
        tracing::debug!(seq, %command, "sending request");

        let rx = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if let Some(reason) = &state.closed {
                return Err(reason.duplicate().into());
            }
            let (tx, rx) = oneshot::channel();
            state.pending.insert(seq, tx);
            let sent = match state.writer.as_mut() {
                Some(writer) => Some(writer.send(OutgoingMessage::Request(request)).await),
                None => {
                    state.backlog.push(request);
                    None
                }
            };
            if let Some(Err(e)) = sent {
                tracing::error!(error = %e, seq, "sending request");
                self.close_locked(state, SessionError::Transport(e));
            }
            rx
        };

        let received = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.state.lock().await.pending.take(seq);
                    tracing::warn!(seq, %command, ?limit, "request timed out");
                    return Err(SessionError::Timeout {
                        command,
                        timeout: limit,
                    }
                    .into());
                }
            },
            None => rx.await,
        };
        received.unwrap_or(Err(SessionError::Disconnected.into()))
    }

    /// Run code through the listener script. Only one execution may be
    /// outstanding; before the debuggee connects it is queued.
    pub(crate) async fn execute(&self, code: String) -> Result<ExecutionOutcome, SessionError> {
        let rx = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            if let Some(reason) = &state.closed {
                return Err(reason.duplicate());
            }
            if state.execute_completion.is_some() {
                return Err(SessionError::ExecutionPending);
            }
            let (tx, rx) = oneshot::channel();
            state.execute_completion = Some(tx);
            let sent = match state.writer.as_mut() {
                Some(writer) => Some(writer.send(OutgoingMessage::Execute(Execute::code(code))).await),
                None => {
                    state.queued_execute = Some(code);
                    None
                }
            };
            if let Some(Err(e)) = sent {
                tracing::error!(error = %e, "sending execute");
                self.close_locked(state, SessionError::Transport(e));
            }
            rx
        };
        rx.await.unwrap_or(Err(SessionError::Disconnected))
    }

    /// Fail the outstanding execution, if there is one.
    pub(crate) async fn cancel_execution(&self) {
        let mut state = self.state.lock().await;
        state.queued_execute = None;
        if let Some(tx) = state.execute_completion.take() {
            tracing::debug!("cancelling outstanding execution");
            let _ = tx.send(Err(SessionError::Cancelled));
        }
    }

    /// Forward traffic that does not come over the socket.
    pub(crate) fn forward(&self, inbound: Inbound) {
        let _ = self.inbound.send(inbound);
    }

    pub(crate) async fn process_exited(&self, exit_code: Option<i32>, message: String) {
        tracing::debug!(?exit_code, "debuggee exited");
        self.close(SessionError::ProcessExited(message.clone())).await;
        self.forward(Inbound::ProcessExited { exit_code, message });
    }

    /// Close the connection, failing everything outstanding with `reason`.
    /// Returns false if it was already closed.
    pub(crate) async fn close(&self, reason: SessionError) -> bool {
        let mut state = self.state.lock().await;
        self.close_locked(&mut state, reason)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub(crate) async fn closed(&self) {
        self.closed.cancelled().await
    }

    fn close_locked(&self, state: &mut State, reason: SessionError) -> bool {
        if state.closed.is_some() {
            return false;
        }
        tracing::debug!(%reason, "closing connection");
        state.writer = None;
        state.backlog.clear();
        state.queued_execute = None;
        state.pending.fail_all(&reason);
        if let Some(tx) = state.execute_completion.take() {
            let _ = tx.send(Err(reason.duplicate()));
        }
        state.closed = Some(reason);
        self.closed.cancel();
        true
    }

    async fn read_loop<R>(self: Arc<Self>, mut reader: MessageReader<R>)
    where
        R: AsyncRead + Unpin,
    {
        let reason = loop {
            let next = tokio::select! {
                _ = self.closed.cancelled() => return,
                next = reader.next() => next,
            };
            match next {
                Some(Ok(message)) => self.dispatch(message).await,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "reading from debuggee");
                    break SessionError::Transport(e);
                }
                None => {
                    tracing::debug!("debuggee closed the connection");
                    break SessionError::Disconnected;
                }
            }
        };
        if self.close(reason).await {
            self.forward(Inbound::Disconnected);
        }
    }

    async fn dispatch(&self, message: Message) {
        match message {
            Message::Response(response) => {
                let seq = response.correlation_seq();
                let waiter = self.state.lock().await.pending.take(seq);
                match waiter {
                    Some(tx) => {
                        tracing::debug!(seq, success = response.success, "received response");
                        let _ = tx.send(Ok(response));
                    }
                    None => tracing::warn!(seq, "response for unknown request"),
                }
            }
            Message::Execute(execute) => {
                let completion = self.state.lock().await.execute_completion.take();
                let Some(tx) = completion else {
                    tracing::debug!("execute result with no outstanding execution");
                    return;
                };
                let outcome = match execute.outcome() {
                    Some(Ok(value)) => ExecutionOutcome::Value(value),
                    Some(Err(error)) => ExecutionOutcome::Error(error),
                    None => ExecutionOutcome::Value(Value::Null),
                };
                let _ = tx.send(Ok(outcome));
            }
            Message::Event(event) => {
                tracing::debug!(event = %event.event, "received event");
                self.forward(Inbound::Event(event));
            }
            Message::Output(output) => self.forward(Inbound::Output {
                text: output.output,
                error: false,
            }),
            Message::OutputError(output) => self.forward(Inbound::Output {
                text: output.output,
                error: true,
            }),
            Message::Request(request) => {
                tracing::debug!(command = %request.command, "ignoring request from debuggee")
            }
            Message::Malformed(malformed) => {
                let Some(seq) = malformed.request_seq else {
                    tracing::warn!(error = %malformed.error, "ignoring malformed packet");
                    return;
                };
                let waiter = self.state.lock().await.pending.take(seq);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(Err(CommandError::MalformedResponse {
                            seq,
                            message: malformed.error,
                        }
                        .into()));
                    }
                    None => tracing::warn!(seq, "malformed response for unknown request"),
                }
            }
            Message::Unknown => tracing::debug!("ignoring packet of unknown type"),
        }
    }
}
