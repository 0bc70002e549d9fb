use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::{
    ansi::ColorSpan,
    types::{BreakpointKey, Module, OriginalLocation},
    values::EvaluationResult,
};

/// Where execution stopped. Zero-based, module wrapper removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StopLocation {
    pub module: Option<Module>,
    pub line: u32,
    pub column: u32,
    pub original: Option<OriginalLocation>,
}

impl StopLocation {
    /// The file and zero-based line to show the user, preferring the
    /// original source.
    pub fn display_position(&self) -> Option<(PathBuf, u32, u32)> {
        match (&self.original, &self.module) {
            (Some(original), _) => Some((original.file.clone(), original.line, original.column)),
            (None, Some(module)) => Some((PathBuf::from(&module.name), self.line, self.column)),
            (None, None) => None,
        }
    }
}

/// Which stream text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Something that happened in the debuggee.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The debuggee connected; commands issued earlier have been sent.
    Connected,
    Break {
        location: StopLocation,
        /// User breakpoints that caused the stop; empty for steps and
        /// explicit suspends.
        breakpoints: Vec<BreakpointKey>,
    },
    Exception {
        location: StopLocation,
        uncaught: bool,
        exception: EvaluationResult,
    },
    ScriptCompiled(Module),
    Output {
        text: String,
        spans: Vec<ColorSpan>,
        stream: OutputStream,
    },
    /// A non-fatal problem the user should hear about.
    Warning(String),
    /// The connection is gone. Sent once; no events follow except a
    /// `ProcessExited` for a launched debuggee.
    Disconnected,
    ProcessExited {
        exit_code: Option<i32>,
        message: String,
    },
}

/// Receiver for session events.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { rx }
    }

    /// Receive the next event.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Receive an event if one is queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Convert to a Stream for use with StreamExt.
    pub fn into_stream(self) -> impl futures::Stream<Item = Event> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}
