use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};
use transport::Response;

use super::{Command, object, parse_body};
use crate::{
    error::CommandError,
    types::{ANONYMOUS_FUNCTION, Backtrace, Module, ModuleId, StackFrame},
    values::{EvaluationResult, Handle, Refs},
    wrapper::ScriptWrapper,
};

/// Request frames `[from, to)` of the current call stack.
#[derive(Debug, Clone)]
pub struct BacktraceCommand {
    from_frame: u32,
    to_frame: u32,
    depth_only: bool,
    wrapper: ScriptWrapper,
}

impl BacktraceCommand {
    pub fn new(from_frame: u32, to_frame: u32) -> Self {
        Self {
            from_frame,
            to_frame,
            depth_only: false,
            wrapper: ScriptWrapper::node(),
        }
    }

    /// Only report the total frame count.
    pub fn depth_only() -> Self {
        Self {
            depth_only: true,
            ..Self::new(0, 1)
        }
    }

    pub fn with_wrapper(mut self, wrapper: ScriptWrapper) -> Self {
        self.wrapper = wrapper;
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BacktraceBody {
    #[serde(default)]
    total_frames: u32,
    #[serde(default)]
    frames: Vec<FrameBody>,
}

#[derive(Debug, Deserialize)]
struct FrameBody {
    index: u32,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
    #[serde(default)]
    func: Value,
    #[serde(default)]
    script: Option<Value>,
    #[serde(default)]
    arguments: Vec<NamedValue>,
    #[serde(default)]
    locals: Vec<NamedValue>,
}

#[derive(Debug, Deserialize)]
struct NamedValue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Value,
}

impl Command for BacktraceCommand {
    type Output = Backtrace;

    fn command(&self) -> &'static str {
        "backtrace"
    }

    fn arguments(&self) -> Option<serde_json::Map<String, Value>> {
        Some(object(json!({
            "fromFrame": self.from_frame,
            "toFrame": self.to_frame,
            "inlineRefs": true,
        })))
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body: BacktraceBody = parse_body(self.command(), response)?;
        if self.depth_only {
            return Ok(Backtrace {
                total_frames: body.total_frames,
                frames: Vec::new(),
            });
        }

        let refs = Refs::new(&response.refs);
        let modules = modules_from_refs(&response.refs);
        let frames = body
            .frames
            .into_iter()
            .map(|frame| self.build_frame(frame, &modules, &refs))
            .collect();

        Ok(Backtrace {
            total_frames: body.total_frames,
            frames,
        })
    }
}

/// Script handle and script id both identify a module in a backtrace.
struct ModuleTable {
    by_handle: HashMap<Handle, Module>,
    by_id: HashMap<ModuleId, Module>,
}

fn modules_from_refs(refs: &[Value]) -> ModuleTable {
    let mut by_handle = HashMap::new();
    let mut by_id = HashMap::new();
    for entry in refs {
        // Entries without a type are plain `{id, name}` module records.
        match entry.get("type") {
            None => {}
            Some(kind) if kind.as_str() == Some("script") => {}
            Some(_) => continue,
        }
        let (Some(id), Some(name)) = (
            entry.get("id").and_then(Value::as_i64),
            entry.get("name").and_then(Value::as_str),
        ) else {
            continue;
        };
        let module = Module::new(id, name);
        if let Some(handle) = entry.get("handle").and_then(Value::as_i64) {
            by_handle.insert(handle, module.clone());
        }
        by_id.insert(id, module);
    }
    ModuleTable { by_handle, by_id }
}

impl BacktraceCommand {
    fn build_frame(&self, frame: FrameBody, modules: &ModuleTable, refs: &Refs<'_>) -> StackFrame {
        let func = refs.resolve(&frame.func);
        let function_name = [func.get("name"), func.get("inferredName")]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_FUNCTION)
            .to_string();

        let module = frame
            .script
            .as_ref()
            .and_then(|script| script.get("ref"))
            .and_then(Value::as_i64)
            .and_then(|handle| modules.by_handle.get(&handle))
            .or_else(|| {
                func.get("scriptId")
                    .and_then(Value::as_i64)
                    .and_then(|id| modules.by_id.get(&id))
            })
            .cloned();

        let values = |named: Vec<NamedValue>| -> Vec<EvaluationResult> {
            named
                .into_iter()
                .map(|v| EvaluationResult::from_mirror(v.name, &v.value, refs))
                .collect()
        };

        StackFrame {
            index: frame.index,
            line: frame.line,
            column: self.wrapper.from_engine_column(frame.line, frame.column),
            function_name,
            module,
            locals: values(frame.locals),
            arguments: values(frame.arguments),
            original: None,
        }
    }
}
