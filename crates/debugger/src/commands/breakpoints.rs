use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object, parse_body};
use crate::{
    error::CommandError,
    types::{Breakpoint, BreakpointId, ExceptionBreak, Module, ModuleId},
    wrapper::ScriptWrapper,
};

/// Bind a breakpoint in the debuggee.
///
/// The breakpoint's position must already be in script coordinates with the
/// module wrapper removed; the wrapper offset is applied here.
#[derive(Debug, Clone)]
pub struct SetBreakpointCommand {
    module: Option<Module>,
    breakpoint: Breakpoint,
    without_predicate: bool,
    remote: bool,
    wrapper: ScriptWrapper,
}

/// Where the debuggee bound a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetBreakpointResult {
    pub id: BreakpointId,
    pub script_id: Option<ModuleId>,
    pub line: u32,
    pub column: u32,
}

impl SetBreakpointCommand {
    pub fn new(module: Option<Module>, breakpoint: Breakpoint) -> Self {
        Self {
            module,
            breakpoint,
            without_predicate: false,
            remote: false,
            wrapper: ScriptWrapper::node(),
        }
    }

    /// Leave out the condition and ignore count.
    pub fn without_predicate(mut self) -> Self {
        self.without_predicate = true;
        self
    }

    /// Match the script by file name pattern instead of its literal path.
    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_wrapper(mut self, wrapper: ScriptWrapper) -> Self {
        self.wrapper = wrapper;
        self
    }
}

/// A case-insensitive pattern matching `path`'s file name at the end of a
/// script name.
pub(crate) fn script_regexp(path: &str) -> String {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let mut pattern = String::new();
    if file_name.len() == path.len() {
        pattern.push('^');
    } else {
        pattern.push_str(r"[\\/]");
    }
    for c in file_name.chars() {
        if c.is_alphabetic() {
            pattern.push('[');
            pattern.extend(c.to_lowercase());
            pattern.extend(c.to_uppercase());
            pattern.push(']');
        } else {
            pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    pattern.push('$');
    pattern
}

#[derive(Debug, Deserialize)]
struct SetBreakpointBody {
    breakpoint: BreakpointId,
    #[serde(default)]
    script_id: Option<ModuleId>,
    #[serde(default)]
    actual_locations: Vec<ActualLocation>,
}

#[derive(Debug, Deserialize)]
struct ActualLocation {
    line: u32,
    column: u32,
    #[serde(default)]
    script_id: Option<ModuleId>,
}

impl Command for SetBreakpointCommand {
    type Output = SetBreakpointResult;

    fn command(&self) -> &'static str {
        "setbreakpoint"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        let bp = &self.breakpoint;
        let (kind, target) = match (&self.module, self.remote) {
            (Some(module), _) => ("scriptId", json!(module.id)),
            (None, true) => ("scriptRegExp", json!(script_regexp(&bp.file))),
            (None, false) => ("script", json!(bp.file)),
        };
        let mut args = object(json!({
            "type": kind,
            "target": target,
            "line": bp.line,
            "column": self.wrapper.to_engine_column(bp.line, bp.column),
            "enabled": bp.enabled,
        }));
        if !self.without_predicate {
            if let Some(condition) = &bp.condition {
                args.insert("condition".to_string(), json!(condition));
            }
            if let Some(count) = bp.break_on.engine_ignore_count() {
                args.insert("ignoreCount".to_string(), json!(count));
            }
        }
        Some(args)
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body: SetBreakpointBody = parse_body(self.command(), response)?;
        let first = body.actual_locations.first();
        let script_id = body
            .script_id
            .or_else(|| self.module.as_ref().map(|m| m.id))
            .or_else(|| first.and_then(|loc| loc.script_id));
        let (line, column) = match first {
            Some(loc) => (loc.line, self.wrapper.from_engine_column(loc.line, loc.column)),
            None => (self.breakpoint.line, self.breakpoint.column),
        };
        Ok(SetBreakpointResult {
            id: body.breakpoint,
            script_id,
            line,
            column,
        })
    }
}

/// Partially update a bound breakpoint. Only the fields set are sent.
#[derive(Debug, Clone, Default)]
pub struct ChangeBreakpointCommand {
    pub id: BreakpointId,
    pub enabled: Option<bool>,
    pub condition: Option<String>,
    pub ignore_count: Option<u32>,
}

impl ChangeBreakpointCommand {
    pub fn new(id: BreakpointId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

impl Command for ChangeBreakpointCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "changebreakpoint"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        let mut args = object(json!({ "breakpoint": self.id }));
        if let Some(enabled) = self.enabled {
            args.insert("enabled".to_string(), json!(enabled));
        }
        if let Some(condition) = &self.condition {
            args.insert("condition".to_string(), json!(condition));
        }
        if let Some(count) = self.ignore_count {
            args.insert("ignoreCount".to_string(), json!(count));
        }
        Some(args)
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClearBreakpointCommand {
    pub id: BreakpointId,
}

impl Command for ClearBreakpointCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "clearbreakpoint"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        Some(object(json!({ "breakpoint": self.id })))
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}

/// Hit counts of every bound breakpoint.
#[derive(Debug, Clone, Copy)]
pub struct ListBreakpointsCommand;

#[derive(Debug, Deserialize)]
struct ListBreakpointsBody {
    #[serde(default)]
    breakpoints: Vec<ListedBreakpoint>,
}

#[derive(Debug, Deserialize)]
struct ListedBreakpoint {
    number: BreakpointId,
    #[serde(default)]
    hit_count: u32,
}

impl Command for ListBreakpointsCommand {
    type Output = HashMap<BreakpointId, u32>;

    fn command(&self) -> &'static str {
        "listbreakpoints"
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body: ListBreakpointsBody = parse_body(self.command(), response)?;
        Ok(body
            .breakpoints
            .into_iter()
            .map(|bp| (bp.number, bp.hit_count))
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetExceptionBreakCommand {
    pub kind: ExceptionBreak,
    pub enabled: bool,
}

impl Command for SetExceptionBreakCommand {
    type Output = ();

    fn command(&self) -> &'static str {
        "setexceptionbreak"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        Some(object(json!({
            "type": self.kind.as_str(),
            "enabled": self.enabled,
        })))
    }

    fn parse_body(&self, _response: &Response) -> Result<Self::Output, CommandError> {
        Ok(())
    }
}
