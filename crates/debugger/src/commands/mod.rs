//! Debugger protocol commands.
//!
//! Every request is `{command, seq, type: "request", arguments?}`; every
//! response carries `success`, `running` and optionally `message`, `body`
//! and `refs`. A [`Command`] supplies the name, the arguments and the body
//! extraction. [`Sequenced::process_response`] applies the common
//! `success` check first so a failed response never reaches body parsing.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use transport::{Request, Response, Seq};

use crate::error::CommandError;

mod backtrace;
mod breakpoints;
mod evaluate;
mod execution;
mod live_edit;
mod lookup;
mod scripts;
mod variables;

pub use backtrace::BacktraceCommand;
pub use breakpoints::{
    ChangeBreakpointCommand, ClearBreakpointCommand, ListBreakpointsCommand,
    SetBreakpointCommand, SetBreakpointResult, SetExceptionBreakCommand,
};
pub use evaluate::EvaluateCommand;
pub use execution::{ContinueCommand, DisconnectCommand, SuspendCommand};
pub use live_edit::ChangeLiveCommand;
pub use lookup::LookupCommand;
pub use scripts::ScriptsCommand;
pub use variables::SetVariableValueCommand;

/// A protocol command.
pub trait Command {
    /// What a successful response yields.
    type Output;

    fn command(&self) -> &'static str;

    /// `None` omits `arguments` from the request.
    fn arguments(&self) -> Option<Map<String, Value>> {
        None
    }

    /// Extract the typed result from a successful response.
    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError>;
}

/// A command with its sequence number.
#[derive(Debug, Clone)]
pub struct Sequenced<C> {
    pub seq: Seq,
    pub command: C,
}

/// The result of a processed response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    /// Whether the debuggee is running after the command.
    pub running: bool,
    pub output: T,
}

impl<C: Command> Sequenced<C> {
    pub fn to_request(&self) -> Request {
        Request {
            seq: self.seq,
            command: self.command.command().to_string(),
            arguments: self.command.arguments(),
        }
    }

    pub fn process_response(&self, response: &Response) -> Result<Reply<C::Output>, CommandError> {
        if !response.success {
            return Err(CommandError::Failed {
                command: self.command.command(),
                message: response.message.clone().unwrap_or_default(),
            });
        }
        let output = self.command.parse_body(response)?;
        Ok(Reply {
            running: response.running,
            output,
        })
    }
}

/// The session's single sequence number generator.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    next: Arc<AtomicI64>,
}

impl Default for CommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandFactory {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn next_seq(&self) -> Seq {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Assign the next sequence number to `command`.
    pub fn create<C: Command>(&self, command: C) -> Sequenced<C> {
        Sequenced {
            seq: self.next_seq(),
            command,
        }
    }
}

/// Convert a `json!` object literal into an argument map.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Deserialize the response body into `T`.
pub(crate) fn parse_body<T: DeserializeOwned>(
    command: &'static str,
    response: &Response,
) -> Result<T, CommandError> {
    let body = response
        .body
        .clone()
        .ok_or(CommandError::MissingBody { command })?;
    serde_json::from_value(body).map_err(|source| CommandError::MalformedBody { command, source })
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;
    use transport::Response;

    pub(crate) fn success(body: Value) -> Response {
        Response {
            seq: 1,
            request_seq: Some(1),
            success: true,
            body: Some(body),
            ..Default::default()
        }
    }

    pub(crate) fn success_with_refs(body: Value, refs: Vec<Value>) -> Response {
        Response {
            refs,
            ..success(body)
        }
    }

    pub(crate) fn failure(message: &str) -> Response {
        Response {
            seq: 1,
            request_seq: Some(1),
            success: false,
            message: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;

    #[test]
    fn sequence_numbers_are_shared_and_increasing() {
        let factory = CommandFactory::new();
        let clone = factory.clone();
        let first = factory.create(SuspendCommand);
        let second = clone.create(SuspendCommand);
        let third = factory.create(DisconnectCommand);
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(third.seq, 3);
    }

    #[test]
    fn arguments_omitted_when_none() {
        let factory = CommandFactory::new();
        let request = factory.create(SuspendCommand).to_request();
        let json = serde_json::to_value(transport::OutgoingMessage::Request(request)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "request", "seq": 1, "command": "suspend"})
        );
    }

    #[test]
    fn failure_short_circuits_body_parsing() {
        let factory = CommandFactory::new();
        let command = factory.create(BacktraceCommand::new(0, 10));
        let err = command
            .process_response(&test_support::failure("No frames"))
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Failed { command: "backtrace", ref message } if message == "No frames"
        ));
    }

    #[test]
    fn running_flag_is_reported() {
        let factory = CommandFactory::new();
        let command = factory.create(ContinueCommand::resume());
        let reply = command
            .process_response(&Response {
                success: true,
                running: true,
                ..Default::default()
            })
            .unwrap();
        assert!(reply.running);
    }
}
