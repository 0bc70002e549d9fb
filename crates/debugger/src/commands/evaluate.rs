use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object};
use crate::{
    error::CommandError,
    values::{EvaluationResult, Handle, Refs},
};

/// What to evaluate.
#[derive(Debug, Clone, PartialEq)]
enum Target {
    Expression(String),
    /// Stringify an existing value.
    Handle(Handle),
}

/// Evaluate an expression in a stack frame, or in the global scope when no
/// frame is given.
#[derive(Debug, Clone)]
pub struct EvaluateCommand {
    target: Target,
    frame: Option<u32>,
}

const CONTEXT_VARIABLE: &str = "variable";

impl EvaluateCommand {
    pub fn expression(expression: impl Into<String>, frame: Option<u32>) -> Self {
        Self {
            target: Target::Expression(expression.into()),
            frame,
        }
    }

    /// Evaluate `toString()` on the value behind `handle`.
    pub fn to_string_of(handle: Handle, frame: Option<u32>) -> Self {
        Self {
            target: Target::Handle(handle),
            frame,
        }
    }
}

impl Command for EvaluateCommand {
    type Output = EvaluationResult;

    fn command(&self) -> &'static str {
        "evaluate"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        let expression = match &self.target {
            Target::Expression(expression) => expression.clone(),
            Target::Handle(_) => format!("{CONTEXT_VARIABLE}.toString()"),
        };
        let mut args = object(json!({
            "expression": expression,
            "frame": self.frame.unwrap_or(0),
            "global": self.frame.is_none(),
            "disable_break": true,
            "maxStringLength": -1,
        }));
        if let Target::Handle(handle) = self.target {
            args.insert(
                "additional_context".to_string(),
                json!([{ "name": CONTEXT_VARIABLE, "handle": handle }]),
            );
        }
        Some(args)
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body = response.body.as_ref().ok_or(CommandError::MissingBody {
            command: self.command(),
        })?;
        let refs = Refs::new(&response.refs);
        let name = match &self.target {
            Target::Expression(expression) => Some(expression.clone()),
            Target::Handle(_) => None,
        };
        Ok(EvaluationResult::from_mirror(name, body, &refs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::{CommandFactory, test_support},
        error::CommandError,
        values::ValueKind,
    };

    #[test]
    fn global_evaluation_defaults_to_frame_zero() {
        let args = EvaluateCommand::expression("1 + 1", None).arguments().unwrap();
        assert_eq!(
            Value::Object(args),
            json!({
                "expression": "1 + 1",
                "frame": 0,
                "global": true,
                "disable_break": true,
                "maxStringLength": -1
            })
        );
    }

    #[test]
    fn handle_evaluation_uses_context_variable() {
        let args = EvaluateCommand::to_string_of(17, Some(2)).arguments().unwrap();
        assert_eq!(args["expression"], "variable.toString()");
        assert_eq!(args["frame"], 2);
        assert_eq!(args["global"], false);
        assert_eq!(
            args["additional_context"],
            json!([{"name": "variable", "handle": 17}])
        );
    }

    #[test]
    fn parses_object_result() {
        let response = test_support::success_with_refs(
            json!({"handle": 3, "type": "object", "className": "Object", "text": "#<Object>"}),
            vec![],
        );
        let result = EvaluateCommand::expression("config", Some(0))
            .parse_body(&response)
            .unwrap();
        assert_eq!(result.name.as_deref(), Some("config"));
        assert_eq!(result.handle, Some(3));
        assert!(result.is_expandable());
        assert_eq!(
            result.kind,
            ValueKind::Object {
                class_name: Some("Object".to_string())
            }
        );
    }

    #[test]
    fn reference_errors_are_command_failures() {
        let factory = CommandFactory::new();
        let err = factory
            .create(EvaluateCommand::expression("missing", None))
            .process_response(&test_support::failure("ReferenceError: missing is not defined"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Failed { command: "evaluate", .. }));
    }
}
