use std::collections::HashMap;

use serde_json::{Map, Value, json};
use transport::Response;

use super::{Command, object};
use crate::{
    error::CommandError,
    values::{EvaluationResult, Handle, Refs},
};

/// Name given to the prototype pseudo-property.
pub const PROTO_PROPERTY: &str = "__proto__";

/// Fetch the properties of one or more values.
///
/// Each handle is queried once however many requesters share it. The
/// output holds one property list per requester, in request order.
#[derive(Debug, Clone)]
pub struct LookupCommand {
    requested: Vec<Requester>,
    handles: Vec<Handle>,
}

#[derive(Debug, Clone)]
struct Requester {
    handle: Handle,
    name: Option<String>,
}

impl LookupCommand {
    pub fn from_handles(handles: impl IntoIterator<Item = Handle>) -> Self {
        Self::build(
            handles
                .into_iter()
                .map(|handle| Requester { handle, name: None })
                .collect(),
        )
    }

    /// Look up the children of `parents`. Parents without a handle get an
    /// empty property list.
    pub fn from_parents<'a>(parents: impl IntoIterator<Item = &'a EvaluationResult>) -> Self {
        Self::build(
            parents
                .into_iter()
                .map(|parent| Requester {
                    handle: parent.handle.unwrap_or(-1),
                    name: parent.name.clone(),
                })
                .collect(),
        )
    }

    fn build(requested: Vec<Requester>) -> Self {
        let mut handles: Vec<Handle> = Vec::with_capacity(requested.len());
        for requester in &requested {
            if requester.handle >= 0 && !handles.contains(&requester.handle) {
                handles.push(requester.handle);
            }
        }
        Self { requested, handles }
    }

    /// The distinct handles sent to the debuggee.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }
}

impl Command for LookupCommand {
    type Output = Vec<Vec<EvaluationResult>>;

    fn command(&self) -> &'static str {
        "lookup"
    }

    fn arguments(&self) -> Option<Map<String, Value>> {
        Some(object(json!({
            "handles": self.handles,
            "includeSource": false,
        })))
    }

    fn parse_body(&self, response: &Response) -> Result<Self::Output, CommandError> {
        let body = response.body.as_ref().ok_or(CommandError::MissingBody {
            command: self.command(),
        })?;
        let refs = Refs::new(&response.refs);

        let mut by_handle: HashMap<Handle, Vec<EvaluationResult>> = HashMap::new();
        for handle in &self.handles {
            let Some(entry) = body.get(handle.to_string()) else {
                tracing::warn!(handle, "lookup response has no entry for handle");
                continue;
            };
            by_handle.insert(*handle, properties(entry, &refs));
        }

        Ok(self
            .requested
            .iter()
            .map(|requester| {
                let mut children = by_handle.get(&requester.handle).cloned().unwrap_or_default();
                // Primitives come back as a lone result; carry the requester's name.
                if let [only] = children.as_mut_slice() {
                    if only.name.is_none() {
                        only.name = requester.name.clone();
                    }
                }
                children
            })
            .collect())
    }
}

fn properties(entry: &Value, refs: &Refs<'_>) -> Vec<EvaluationResult> {
    let mut results: Vec<EvaluationResult> = entry
        .get("properties")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|property| {
            let name = match property.get("name")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(EvaluationResult::from_mirror(Some(name), property, refs))
        })
        .collect();

    if results.is_empty() {
        return vec![EvaluationResult::from_mirror(None, entry, refs)];
    }

    if let Some(proto) = entry.get("protoObject") {
        results.push(EvaluationResult::from_mirror(None, proto, refs).with_name(PROTO_PROPERTY));
    }
    results
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{commands::test_support::success_with_refs, values::ValueKind};

    fn object_result(handle: Handle, name: &str) -> EvaluationResult {
        EvaluationResult::from_mirror(
            Some(name.to_string()),
            &json!({"handle": handle, "type": "object", "className": "Object"}),
            &Refs::default(),
        )
    }

    #[test]
    fn duplicate_handles_are_queried_once() {
        let a = object_result(4, "a");
        let b = object_result(4, "b");
        let command = LookupCommand::from_parents([&a, &b]);
        assert_eq!(command.handles(), &[4]);
        assert_eq!(command.arguments().unwrap()["handles"], json!([4]));

        let response = success_with_refs(
            json!({
                "4": {
                    "handle": 4,
                    "type": "object",
                    "className": "Object",
                    "properties": [{"name": "x", "ref": 10}, {"name": 0, "ref": 11}],
                    "protoObject": {"ref": 12}
                }
            }),
            vec![
                json!({"handle": 10, "type": "number", "value": 1, "text": "1"}),
                json!({"handle": 11, "type": "string", "value": "first", "length": 5}),
                json!({"handle": 12, "type": "object", "className": "Object", "text": "#<Object>"}),
            ],
        );
        let output = command.parse_body(&response).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0], output[1]);

        let names: Vec<_> = output[0].iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, ["x", "0", PROTO_PROPERTY]);
        assert_eq!(output[0][0].kind, ValueKind::Number(Some(1.0)));
        assert_eq!(output[0][1].text, "first");
        assert!(output[0][2].is_expandable());
    }

    #[test]
    fn entry_without_properties_is_primitive() {
        let command = LookupCommand::from_handles([8]);
        let response = success_with_refs(
            json!({"8": {"handle": 8, "type": "string", "value": "hello", "length": 5}}),
            vec![],
        );
        let output = command.parse_body(&response).unwrap();
        assert_eq!(output[0].len(), 1);
        assert_eq!(output[0][0].text, "hello");
        assert_eq!(output[0][0].kind, ValueKind::String { length: Some(5) });
    }

    #[test]
    fn missing_entries_yield_empty_lists() {
        let command = LookupCommand::from_handles([1, 2]);
        let output = command.parse_body(&success_with_refs(json!({}), vec![])).unwrap();
        assert_eq!(output, vec![Vec::new(), Vec::new()]);
    }
}
