use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object};
use crate::{error::CommandError, types::SteppingKind};

/// Resume execution, optionally stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinueCommand {
    step: Option<(SteppingKind, u32)>,
}

impl ContinueCommand {
    pub fn resume() -> Self {
        Self { step: None }
    }

    pub fn step(kind: SteppingKind, count: u32) -> Self {
        Self {
            step: Some((kind, count.max(1))),
        }
    }
}

impl Command for ContinueCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "continue"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        self.step.map(|(kind, count)| {
            object(json!({
                "stepaction": kind.step_action(),
                "stepcount": count,
            }))
        })
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}

/// Break into a running debuggee.
#[derive(Debug, Clone, Copy)]
pub struct SuspendCommand;

impl Command for SuspendCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "suspend"
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}

/// Detach from the debuggee and let it run.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectCommand;

impl Command for DisconnectCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "disconnect"
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}
