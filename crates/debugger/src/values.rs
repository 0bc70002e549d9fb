//! Values produced by evaluate, lookup and backtrace.
//!
//! The debuggee describes values as mirrors: `{handle, type, value,
//! className, text, length}`. A mirror may be inlined or referenced as
//! `{"ref": N}` into the response's `refs` array.

use std::collections::HashMap;

use serde_json::Value;

/// A debuggee-assigned value handle.
pub type Handle = i64;

/// The shape of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Undefined,
    Null,
    Boolean(bool),
    /// `None` for values JSON cannot carry (`NaN`, `Infinity`).
    Number(Option<f64>),
    String {
        /// Length of the full string in the debuggee.
        length: Option<u64>,
    },
    Object {
        class_name: Option<String>,
    },
    Function,
    Other(String),
}

impl ValueKind {
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ValueKind::Object { .. } | ValueKind::Function)
    }
}

/// A named, typed value referencing a debuggee handle.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub handle: Option<Handle>,
    /// Expression or property name this value was reached through.
    pub name: Option<String>,
    pub type_name: String,
    /// Display text.
    pub text: String,
    pub kind: ValueKind,
    /// Break generation the handle belongs to.
    pub(crate) epoch: u64,
}

impl EvaluationResult {
    /// Whether the value has children to look up.
    pub fn is_expandable(&self) -> bool {
        self.handle.is_some() && !self.kind.is_primitive()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn from_mirror(name: Option<String>, mirror: &Value, refs: &Refs<'_>) -> Self {
        let mirror = refs.resolve(mirror);
        let handle = mirror
            .get("handle")
            .or_else(|| mirror.get("ref"))
            .and_then(Value::as_i64);
        let type_name = mirror
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("undefined")
            .to_string();
        let raw_text = mirror.get("text").and_then(Value::as_str);
        let value = mirror.get("value");

        let kind = match type_name.as_str() {
            "undefined" => ValueKind::Undefined,
            "null" => ValueKind::Null,
            "boolean" => ValueKind::Boolean(value.and_then(Value::as_bool).unwrap_or(false)),
            "number" => ValueKind::Number(value.and_then(Value::as_f64)),
            "string" => ValueKind::String {
                length: mirror.get("length").and_then(Value::as_u64),
            },
            "object" | "error" | "regexp" | "date" | "promise" | "map" | "set" => {
                ValueKind::Object {
                    class_name: mirror
                        .get("className")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }
            "function" => ValueKind::Function,
            other => ValueKind::Other(other.to_string()),
        };

        let text = match (&kind, value, raw_text) {
            (ValueKind::String { .. }, Some(Value::String(s)), _) => s.clone(),
            (_, _, Some(text)) => text.to_string(),
            (ValueKind::Undefined, _, _) => "undefined".to_string(),
            (ValueKind::Null, _, _) => "null".to_string(),
            (ValueKind::Object { class_name: Some(class), .. }, _, _) => format!("#<{class}>"),
            (_, Some(Value::String(s)), _) => s.clone(),
            (_, Some(v), _) => v.to_string(),
            (_, None, None) => type_name.clone(),
        };

        Self {
            handle,
            name,
            type_name,
            text,
            kind,
            epoch: 0,
        }
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Mirrors from a response's `refs` array, by handle.
#[derive(Debug, Default)]
pub(crate) struct Refs<'a> {
    by_handle: HashMap<Handle, &'a Value>,
}

impl<'a> Refs<'a> {
    pub(crate) fn new(refs: &'a [Value]) -> Self {
        let by_handle = refs
            .iter()
            .filter_map(|r| Some((r.get("handle")?.as_i64()?, r)))
            .collect();
        Self { by_handle }
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&'a Value> {
        self.by_handle.get(&handle).copied()
    }

    /// Follow a `{"ref": N}` mirror into the refs table. Inline mirrors, and
    /// references missing from the table, are returned as given.
    pub(crate) fn resolve<'v>(&self, mirror: &'v Value) -> &'v Value
    where
        'a: 'v,
    {
        if mirror.get("type").is_some() {
            return mirror;
        }
        mirror
            .get("ref")
            .and_then(Value::as_i64)
            .and_then(|handle| self.get(handle))
            .unwrap_or(mirror)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn primitives() {
        let refs = Refs::default();
        let number =
            EvaluationResult::from_mirror(None, &json!({"handle": 4, "type": "number", "value": 3.5, "text": "3.5"}), &refs);
        assert_eq!(number.kind, ValueKind::Number(Some(3.5)));
        assert_eq!(number.text, "3.5");
        assert!(!number.is_expandable());

        let nan = EvaluationResult::from_mirror(None, &json!({"type": "number", "text": "NaN"}), &refs);
        assert_eq!(nan.kind, ValueKind::Number(None));
        assert_eq!(nan.text, "NaN");

        let string = EvaluationResult::from_mirror(
            Some("greeting".into()),
            &json!({"handle": 5, "type": "string", "value": "hello", "length": 5}),
            &refs,
        );
        assert_eq!(string.text, "hello");
        assert_eq!(string.kind, ValueKind::String { length: Some(5) });
        assert_eq!(string.name.as_deref(), Some("greeting"));

        let undefined = EvaluationResult::from_mirror(None, &json!({"type": "undefined"}), &refs);
        assert_eq!(undefined.text, "undefined");
    }

    #[test]
    fn objects_through_refs() {
        let refs_json = vec![json!({"handle": 9, "type": "object", "className": "Array", "text": "#<Array>"})];
        let refs = Refs::new(&refs_json);
        let value = EvaluationResult::from_mirror(Some("items".into()), &json!({"ref": 9}), &refs);
        assert_eq!(value.handle, Some(9));
        assert_eq!(
            value.kind,
            ValueKind::Object {
                class_name: Some("Array".to_string())
            }
        );
        assert_eq!(value.text, "#<Array>");
        assert!(value.is_expandable());
    }

    #[test]
    fn unresolved_ref_keeps_handle() {
        let refs = Refs::default();
        let value = EvaluationResult::from_mirror(None, &json!({"ref": 12}), &refs);
        assert_eq!(value.handle, Some(12));
        assert_eq!(value.kind, ValueKind::Undefined);
    }
}
