use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object};
use crate::{
    error::CommandError,
    values::{EvaluationResult, Handle, Refs},
};

/// Assign the value behind `handle` to a local variable of a frame.
#[derive(Debug, Clone)]
pub struct SetVariableValueCommand {
    pub frame: u32,
    pub name: String,
    pub handle: Handle,
}

impl Command for SetVariableValueCommand {
    type Output = EvaluationResult;

    fn command(&self) -> &'static str {
        "setVariableValue"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        Some(object(json!({
            "name": self.name,
            "newValue": { "handle": self.handle },
            "scope": { "frameNumber": self.frame, "number": 0 },
        })))
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let new_value = response
            .body
            .as_ref()
            .and_then(|body| body.get("newValue"))
            .ok_or(CommandError::MissingBody {
                command: self.command(),
            })?;
        let refs = Refs::new(&response.refs);
        Ok(EvaluationResult::from_mirror(
            Some(self.name.clone()),
            new_value,
            &refs,
        ))
    }
}
