use serde::Deserialize;
use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object, parse_body};
use crate::{
    error::CommandError,
    types::{Module, ModuleId},
    wrapper::ScriptWrapper,
};

/// Normal (non-native, non-extension) scripts.
const NORMAL_SCRIPTS: u32 = 4;

/// List loaded scripts, or fetch a single one.
#[derive(Debug, Clone)]
pub struct ScriptsCommand {
    include_source: bool,
    module_id: Option<ModuleId>,
    wrapper: ScriptWrapper,
}

impl ScriptsCommand {
    pub fn new(include_source: bool, module_id: Option<ModuleId>) -> Self {
        Self {
            include_source,
            module_id,
            wrapper: ScriptWrapper::node(),
        }
    }

    pub fn with_wrapper(mut self, wrapper: ScriptWrapper) -> Self {
        self.wrapper = wrapper;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ScriptBody {
    id: ModuleId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl Command for ScriptsCommand {
    type Output = Vec<Module>;

    fn command(&self) -> &'static str {
        "scripts"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        let mut args = object(json!({
            "types": NORMAL_SCRIPTS,
            "includeSource": self.include_source,
        }));
        if let Some(id) = self.module_id {
            args.insert("ids".to_string(), json!([id]));
        }
        Some(args)
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let scripts: Vec<ScriptBody> = parse_body(self.command(), response)?;
        Ok(scripts
            .into_iter()
            .map(|script| Module {
                id: script.id,
                // Scripts compiled from eval have no name.
                name: script.name.unwrap_or_default(),
                source: script
                    .source
                    .map(|source| self.wrapper.unwrap(&source).to_string()),
            })
            .collect())
    }
}
