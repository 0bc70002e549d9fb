//! The module wrapper Node applies to every top-level script.

/// Prologue and epilogue surrounding module source as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptWrapper {
    prologue: String,
    epilogue: String,
}

pub const NODE_PROLOGUE: &str = "(function (exports, require, module, __filename, __dirname) { ";
pub const NODE_EPILOGUE: &str = "\n});";

impl ScriptWrapper {
    pub fn new(prologue: impl Into<String>, epilogue: impl Into<String>) -> Self {
        Self {
            prologue: prologue.into(),
            epilogue: epilogue.into(),
        }
    }

    /// The wrapper used by Node's CommonJS loader.
    pub fn node() -> Self {
        Self::new(NODE_PROLOGUE, NODE_EPILOGUE)
    }

    /// Columns the prologue adds to line 0.
    pub fn prologue_len(&self) -> u32 {
        self.prologue.chars().count() as u32
    }

    pub fn wrap(&self, source: &str) -> String {
        format!("{}{source}{}", self.prologue, self.epilogue)
    }

    /// Strip the wrapper from engine-side source. Source without the wrapper
    /// is returned unchanged.
    pub fn unwrap<'a>(&self, source: &'a str) -> &'a str {
        source
            .strip_prefix(self.prologue.as_str())
            .and_then(|s| s.strip_suffix(self.epilogue.as_str()))
            .unwrap_or(source)
    }

    /// Engine column for a column on `line` of the unwrapped source.
    pub fn to_engine_column(&self, line: u32, column: u32) -> u32 {
        if line == 0 {
            column + self.prologue_len()
        } else {
            column
        }
    }

    /// Inverse of [`ScriptWrapper::to_engine_column`].
    pub fn from_engine_column(&self, line: u32, column: u32) -> u32 {
        if line == 0 {
            column.saturating_sub(self.prologue_len())
        } else {
            column
        }
    }
}

impl Default for ScriptWrapper {
    fn default() -> Self {
        Self::node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_and_unwrap() {
        let wrapper = ScriptWrapper::node();
        let source = "console.log('hi');";
        let wrapped = wrapper.wrap(source);
        assert!(wrapped.starts_with("(function (exports"));
        assert!(wrapped.ends_with("\n});"));
        assert_eq!(wrapper.unwrap(&wrapped), source);
        assert_eq!(wrapper.unwrap(source), source);
    }

    #[test]
    fn column_adjustment_only_on_first_line() {
        let wrapper = ScriptWrapper::node();
        let len = wrapper.prologue_len();
        assert_eq!(len, 62);
        assert_eq!(wrapper.to_engine_column(0, 4), 4 + len);
        assert_eq!(wrapper.from_engine_column(0, 4 + len), 4);
        assert_eq!(wrapper.to_engine_column(3, 4), 4);
        assert_eq!(wrapper.from_engine_column(3, 4), 4);
        assert_eq!(wrapper.from_engine_column(0, 2), 0);
    }
}
