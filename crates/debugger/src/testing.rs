//! Testing utilities for code built on [`DebugSession`].
//!
//! [`MockDebuggee`] plays the debuggee's side of an in-memory connection:
//! it reads the session's requests and `execute` packets and writes
//! responses, events and output back.

use std::sync::atomic::{AtomicI64, Ordering};

use futures::StreamExt;
use serde_json::Value;
use tokio::{
    io::DuplexStream,
    sync::Mutex,
    time::{Duration, timeout},
};
use transport::{
    Event, Execute, Message, MessageReader, MessageWriter, OutgoingMessage, Output, Request,
    Response, split, testing::MemoryTransport,
};

use crate::{config::SessionConfig, events::EventReceiver, session::DebugSession};

const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// The debuggee side of an in-memory session.
pub struct MockDebuggee {
    reader: Mutex<MessageReader<DuplexStream>>,
    writer: Mutex<Option<MessageWriter<DuplexStream>>>,
    sequence: AtomicI64,
}

impl MockDebuggee {
    /// Start a session connected to a new mock debuggee.
    pub async fn connect(config: SessionConfig) -> (DebugSession, EventReceiver, MockDebuggee) {
        let (client, debuggee) = MemoryTransport::pair();
        let (reader, writer) = split(debuggee);
        let (session, events) = DebugSession::from_transport(client, config)
            .await
            .expect("failed to start session over memory transport");
        let mock = MockDebuggee {
            reader: Mutex::new(reader),
            writer: Mutex::new(Some(writer)),
            sequence: AtomicI64::new(1),
        };
        (session, events, mock)
    }

    fn next_seq(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// The next message from the session, if any arrives within five
    /// seconds.
    pub async fn recv(&self) -> Option<Message> {
        let mut reader = self.reader.lock().await;
        match timeout(DEFAULT_WAIT, reader.next()).await {
            Ok(Some(Ok(message))) => Some(message),
            _ => None,
        }
    }

    /// Wait for a request for `command`, skipping anything else.
    pub async fn expect_request(&self, command: &str) -> Request {
        loop {
            match self.recv().await {
                Some(Message::Request(request)) if request.command == command => return request,
                Some(other) => {
                    tracing::debug!(?other, "skipping message while waiting for '{command}'")
                }
                None => panic!("timeout waiting for '{command}' request"),
            }
        }
    }

    /// Wait for an `execute` packet.
    pub async fn expect_execute(&self) -> Execute {
        loop {
            match self.recv().await {
                Some(Message::Execute(execute)) => return execute,
                Some(other) => tracing::debug!(?other, "skipping message while waiting for execute"),
                None => panic!("timeout waiting for execute packet"),
            }
        }
    }

    async fn write(&self, message: OutgoingMessage) {
        let mut writer = self.writer.lock().await;
        writer
            .as_mut()
            .expect("mock debuggee already closed")
            .send(message)
            .await
            .expect("failed to write to session");
    }

    fn response(&self, request: &Request) -> Response {
        Response {
            seq: self.next_seq(),
            request_seq: Some(request.seq),
            command: Some(request.command.clone()),
            success: true,
            ..Default::default()
        }
    }

    /// Answer `request` successfully, leaving the debuggee stopped.
    pub async fn respond(&self, request: &Request, body: Value) {
        self.respond_with_refs(request, body, Vec::new()).await;
    }

    pub async fn respond_with_refs(&self, request: &Request, body: Value, refs: Vec<Value>) {
        let response = Response {
            body: Some(body),
            refs,
            ..self.response(request)
        };
        self.write(OutgoingMessage::Response(response)).await;
    }

    /// Answer `request` with no body and the debuggee running.
    pub async fn respond_running(&self, request: &Request) {
        let response = Response {
            running: true,
            ..self.response(request)
        };
        self.write(OutgoingMessage::Response(response)).await;
    }

    /// Reject `request` with `message`.
    pub async fn fail(&self, request: &Request, message: &str) {
        let response = Response {
            success: false,
            message: Some(message.to_string()),
            ..self.response(request)
        };
        self.write(OutgoingMessage::Response(response)).await;
    }

    pub async fn send_event(&self, event: &str, body: Value) {
        let event = Event {
            seq: self.next_seq(),
            event: event.to_string(),
            body: Some(body),
        };
        self.write(OutgoingMessage::Event(event)).await;
    }

    pub async fn execute_result(&self, result: Value) {
        self.write(OutgoingMessage::Execute(Execute {
            result: Some(result),
            ..Default::default()
        }))
        .await;
    }

    pub async fn execute_error(&self, error: Value) {
        self.write(OutgoingMessage::Execute(Execute {
            error: Some(error),
            ..Default::default()
        }))
        .await;
    }

    /// Write program output, as the listener script does.
    pub async fn output(&self, text: &str, error: bool) {
        let output = Output {
            output: text.to_string(),
        };
        let message = if error {
            OutgoingMessage::OutputError(output)
        } else {
            OutgoingMessage::Output(output)
        };
        self.write(message).await;
    }

    /// Close the debuggee's end of the connection.
    pub async fn close(&self) {
        self.writer.lock().await.take();
    }
}
