//! Client for the legacy V8 debugger protocol spoken by node.
//!
//! A [`DebugSession`] launches or attaches to a debuggee and exposes the
//! protocol's operations as async methods. Unsolicited traffic (breaks,
//! exceptions, compiled scripts and program output) arrives through the
//! [`EventReceiver`] returned alongside the session.
mod ansi;
pub mod commands;
mod config;
mod connection;
mod error;
mod events;
mod handles;
mod listener;
mod pending_requests;
mod positions;
mod session;
mod types;
mod values;
mod wrapper;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ansi::{AnsiTranslator, Color, ColorSpan, TranslatedOutput};
pub use config::SessionConfig;
pub use error::{CommandError, DebuggerError, Result, SessionError};
pub use events::{Event, EventReceiver, OutputStream, StopLocation};
pub use listener::Listener;
pub use session::{BreakpointInfo, DebugSession};
pub use types::{
    ANONYMOUS_FUNCTION, Backtrace, BreakOn, Breakpoint, BreakpointBinding, BreakpointId,
    BreakpointKey, ExceptionBreak, ExecutionOutcome, LiveEditResult, Module, ModuleId,
    OriginalLocation, StackFrame, SteppingKind,
};
pub use values::{EvaluationResult, Handle, ValueKind};
pub use wrapper::ScriptWrapper;

pub use server::LaunchArguments;
