use serde::Deserialize;
use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object, parse_body};
use crate::{
    error::CommandError,
    types::{LiveEditResult, ModuleId},
    wrapper::ScriptWrapper,
};

/// Replace a script's source in the running debuggee.
#[derive(Debug, Clone)]
pub struct ChangeLiveCommand {
    script_id: ModuleId,
    new_source: String,
}

impl ChangeLiveCommand {
    /// `source` is the unwrapped module text; the wrapper is re-applied.
    pub fn new(script_id: ModuleId, source: &str, wrapper: &ScriptWrapper) -> Self {
        Self {
            script_id,
            new_source: wrapper.wrap(source),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChangeLiveBody {
    result: ChangeLiveResult,
}

#[derive(Debug, Deserialize)]
struct ChangeLiveResult {
    #[serde(default)]
    updated: bool,
    #[serde(default)]
    stack_modified: bool,
}

impl Command for ChangeLiveCommand {
    type Output = LiveEditResult;

    fn command(&self) -> &'static str {
        "changelive"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        Some(object(json!({
            "script_id": self.script_id,
            "new_source": self.new_source,
            "preview_only": false,
        })))
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body: ChangeLiveBody = parse_body(self.command(), response)?;
        Ok(LiveEditResult {
            updated: body.result.updated,
            stack_modified: body.result.stack_modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::success;

    #[test]
    fn sends_wrapped_source() {
        let wrapper = ScriptWrapper::node();
        let args = ChangeLiveCommand::new(41, "let x = 2;", &wrapper)
            .arguments()
            .unwrap();
        assert_eq!(args["script_id"], 41);
        assert_eq!(args["new_source"], wrapper.wrap("let x = 2;"));
        assert_eq!(args["preview_only"], false);
    }

    #[test]
    fn reports_flags() {
        let result = ChangeLiveCommand::new(41, "", &ScriptWrapper::node())
            .parse_body(&success(json!({
                "change_log": [],
                "result": {"updated": true, "stack_modified": true, "change_tree": {}},
                "stepin_recommended": false
            })))
            .unwrap();
        assert_eq!(
            result,
            LiveEditResult {
                updated: true,
                stack_modified: true
            }
        );
    }
}
