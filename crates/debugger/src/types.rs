use std::path::PathBuf;

use crate::values::EvaluationResult;

/// Debuggee-assigned script id.
pub type ModuleId = i64;

/// Debuggee-assigned breakpoint number.
pub type BreakpointId = i64;

/// A loaded script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    /// File name or URL.
    pub name: String,
    /// Source text with the module wrapper stripped, once fetched.
    pub source: Option<String>,
}

impl Module {
    pub fn new(id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source: None,
        }
    }

    /// Whether this script was loaded from `path`, ignoring case and
    /// separator style.
    pub fn is_file(&self, path: &str) -> bool {
        normalise_separators(&self.name).eq_ignore_ascii_case(&normalise_separators(path))
    }
}

fn normalise_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// A position in an original (pre-compilation) source file. Zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// One frame of a backtrace.
///
/// `line` and `column` are zero-based positions in the generated script
/// with the module wrapper removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StackFrame {
    pub index: u32,
    pub line: u32,
    pub column: u32,
    pub function_name: String,
    pub module: Option<Module>,
    pub locals: Vec<EvaluationResult>,
    pub arguments: Vec<EvaluationResult>,
    /// Where this frame lands in the original source, when a source map
    /// applies.
    pub original: Option<OriginalLocation>,
}

/// Placeholder for functions with neither a declared nor an inferred name.
pub const ANONYMOUS_FUNCTION: &str = "(anonymous function)";

/// The result of a backtrace request.
#[derive(Debug, Clone, PartialEq)]
pub struct Backtrace {
    pub total_frames: u32,
    pub frames: Vec<StackFrame>,
}

/// When a bound breakpoint should stop execution, by hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakOn {
    #[default]
    Always,
    Equal(u32),
    GreaterOrEqual(u32),
    /// Every n-th hit.
    Mod(u32),
}

impl BreakOn {
    /// The engine's `ignoreCount`, for policies the engine can express.
    pub fn engine_ignore_count(&self) -> Option<u32> {
        match self {
            BreakOn::GreaterOrEqual(n) => Some(n.saturating_sub(1)),
            _ => None,
        }
    }

    /// Whether hits must be counted and filtered on this side.
    pub fn needs_client_check(&self) -> bool {
        matches!(self, BreakOn::Equal(_) | BreakOn::Mod(_))
    }

    pub fn is_satisfied(&self, hit_count: u32) -> bool {
        match *self {
            BreakOn::Always => true,
            BreakOn::Equal(n) => hit_count == n,
            BreakOn::GreaterOrEqual(n) => hit_count >= n,
            BreakOn::Mod(n) => n != 0 && hit_count % n == 0,
        }
    }
}

/// A user-defined breakpoint, positioned in the file the user sees.
///
/// `line` and `column` are zero-based. For files with a source map this is
/// the original source; otherwise the script itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub condition: Option<String>,
    pub enabled: bool,
    pub break_on: BreakOn,
}

impl Breakpoint {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            condition: None,
            enabled: true,
            break_on: BreakOn::Always,
        }
    }

    /// Whether binding needs a follow-up to apply a condition or ignore
    /// count.
    pub fn has_predicate(&self) -> bool {
        self.condition.is_some() || self.break_on.engine_ignore_count().is_some()
    }
}

/// Session-assigned identity of a user breakpoint, stable across
/// rebinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointKey(pub u64);

impl std::fmt::Display for BreakpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The debuggee-side realization of a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointBinding {
    pub id: BreakpointId,
    pub script_id: Option<ModuleId>,
    /// Actual zero-based location in the script, with the module wrapper
    /// removed.
    pub line: u32,
    pub column: u32,
    pub original: Option<OriginalLocation>,
}

/// Stepping granularity for `continue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteppingKind {
    Into,
    Out,
    Over,
}

impl SteppingKind {
    pub fn step_action(&self) -> &'static str {
        match self {
            SteppingKind::Into => "in",
            SteppingKind::Out => "out",
            SteppingKind::Over => "next",
        }
    }
}

/// Which exceptions break execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionBreak {
    Uncaught,
    All,
}

impl ExceptionBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionBreak::Uncaught => "uncaught",
            ExceptionBreak::All => "all",
        }
    }
}

/// Outcome of replacing a script's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveEditResult {
    pub updated: bool,
    pub stack_modified: bool,
}

/// Outcome of a REPL execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Value(serde_json::Value),
    Error(serde_json::Value),
}
