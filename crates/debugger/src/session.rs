//! The debug session: high-level operations over the command model.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use serde_json::Value;
use server::{LaunchArguments, OutputLine};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use transport::Transport;

use crate::{
    ansi::AnsiTranslator,
    commands::{
        BacktraceCommand, ChangeBreakpointCommand, ChangeLiveCommand, ClearBreakpointCommand,
        Command, CommandFactory, ContinueCommand, DisconnectCommand, EvaluateCommand,
        ListBreakpointsCommand, LookupCommand, Reply, ScriptsCommand, SetBreakpointCommand,
        SetExceptionBreakCommand, SetVariableValueCommand, SuspendCommand,
    },
    config::SessionConfig,
    connection::{Connection, Inbound},
    error::{CommandError, Result, SessionError},
    events::{Event, EventReceiver, OutputStream, StopLocation},
    handles::HandleTable,
    listener::Listener,
    positions::SourceMapCache,
    types::{
        Backtrace, BreakOn, Breakpoint, BreakpointBinding, BreakpointId, BreakpointKey,
        ExceptionBreak, ExecutionOutcome, LiveEditResult, Module, ModuleId, OriginalLocation,
        SteppingKind,
    },
    values::{EvaluationResult, Refs},
};

/// A user breakpoint and its current binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointInfo {
    pub key: BreakpointKey,
    pub breakpoint: Breakpoint,
    pub binding: Option<BreakpointBinding>,
    /// Hits observed by this session.
    pub hit_count: u32,
}

#[derive(Default)]
struct SessionState {
    modules: HashMap<ModuleId, Module>,
    breakpoints: HashMap<BreakpointKey, BreakpointInfo>,
    handles: HandleTable,
    source_maps: SourceMapCache,
    stdout: AnsiTranslator,
    stderr: AnsiTranslator,
}

impl SessionState {
    fn remember_module(&mut self, module: &Module) {
        self.modules
            .entry(module.id)
            .and_modify(|known| known.name.clone_from(&module.name))
            .or_insert_with(|| module.clone());
    }

    fn module_for_file(&self, file: &str) -> Option<Module> {
        self.modules.values().find(|m| m.is_file(file)).cloned()
    }

    fn key_for_binding(&self, id: BreakpointId) -> Option<BreakpointKey> {
        self.breakpoints
            .values()
            .find(|info| info.binding.as_ref().is_some_and(|b| b.id == id))
            .map(|info| info.key)
    }
}

struct SessionInner {
    connection: Arc<Connection>,
    factory: CommandFactory,
    config: SessionConfig,
    state: Mutex<SessionState>,
    events: mpsc::UnboundedSender<Event>,
    next_breakpoint: AtomicU64,
    warned_legacy_protocol: AtomicBool,
}

/// A debugging session with one debuggee.
///
/// Per-command failures come back as [`crate::CommandError`] and leave the
/// session usable; once a [`SessionError`] reports a fatal condition every
/// further operation fails the same way.
pub struct DebugSession {
    inner: Arc<SessionInner>,
    listener: Option<Listener>,
    event_task: JoinHandle<()>,
}

impl DebugSession {
    /// Start the debuggee and connect to it.
    ///
    /// Returns as soon as the process is running; commands issued before it
    /// connects are sent once it does.
    #[tracing::instrument(skip(arguments, config), fields(script = %arguments.script.display()))]
    pub async fn launch(
        arguments: &LaunchArguments,
        config: SessionConfig,
    ) -> Result<(Self, EventReceiver)> {
        let (connection, inbound) = Connection::new(config.command_timeout, config.max_message_size);
        let attach_timeout = config.attach_timeout;
        let (mut session, events) = Self::start(Arc::clone(&connection), inbound, config);

        if let Ok(node) = arguments.resolve_node() {
            session.inner.check_node_version(&node).await;
        }

        session.listener = Some(Listener::launch(arguments, connection, attach_timeout).await?);
        Ok((session, events))
    }

    /// Connect to a debuggee already listening on `addr`.
    #[tracing::instrument(skip(config))]
    pub async fn attach(addr: SocketAddr, config: SessionConfig) -> Result<(Self, EventReceiver)> {
        let (connection, inbound) = Connection::new(config.command_timeout, config.max_message_size);
        let attach_timeout = config.attach_timeout;
        let (mut session, events) = Self::start(Arc::clone(&connection), inbound, config);
        session.listener = Some(Listener::attach_to(addr, connection, attach_timeout).await?);
        Ok((session, events))
    }

    /// Run a session over an already-connected transport.
    pub async fn from_transport<T: Transport>(
        transport: T,
        config: SessionConfig,
    ) -> Result<(Self, EventReceiver)> {
        let (connection, inbound) = Connection::new(config.command_timeout, config.max_message_size);
        let (session, events) = Self::start(Arc::clone(&connection), inbound, config);
        connection.attach(transport).await?;
        Ok((session, events))
    }

    fn start(
        connection: Arc<Connection>,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        config: SessionConfig,
    ) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            connection,
            factory: CommandFactory::new(),
            config,
            state: Mutex::new(SessionState::default()),
            events: events_tx,
            next_breakpoint: AtomicU64::new(1),
            warned_legacy_protocol: AtomicBool::new(false),
        });
        let event_task = tokio::spawn(Arc::clone(&inner).process_inbound(inbound));
        (
            Self {
                inner,
                listener: None,
                event_task,
            },
            EventReceiver::new(events_rx),
        )
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.listener.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Frames `[from, to)` of the current call stack, with original source
    /// positions where a source map applies.
    #[tracing::instrument(skip(self))]
    pub async fn backtrace(&self, from: u32, to: u32) -> Result<Backtrace> {
        let command = BacktraceCommand::new(from, to).with_wrapper(self.inner.config.wrapper.clone());
        let mut backtrace = self.inner.send(command).await?.output;

        let mut state = self.inner.state.lock().await;
        for frame in &mut backtrace.frames {
            if let Some(module) = &frame.module {
                state.remember_module(module);
                frame.original = state.source_maps.to_original(&module.name, frame.line, frame.column);
            }
            frame.locals = state.handles.record_all(std::mem::take(&mut frame.locals));
            frame.arguments = state.handles.record_all(std::mem::take(&mut frame.arguments));
        }
        Ok(backtrace)
    }

    /// Number of frames on the current call stack.
    pub async fn stack_depth(&self) -> Result<u32> {
        Ok(self.inner.send(BacktraceCommand::depth_only()).await?.output.total_frames)
    }

    /// Bind a new breakpoint.
    ///
    /// A command failure while binding leaves no breakpoint behind.
    #[tracing::instrument(skip(self))]
    pub async fn set_breakpoint(&self, breakpoint: Breakpoint) -> Result<BreakpointInfo> {
        let key = BreakpointKey(self.inner.next_breakpoint.fetch_add(1, Ordering::SeqCst));
        let binding = self.inner.bind(&breakpoint).await?;
        let info = BreakpointInfo {
            key,
            breakpoint,
            binding: Some(binding),
            hit_count: 0,
        };
        self.inner
            .state
            .lock()
            .await
            .breakpoints
            .insert(key, info.clone());
        Ok(info)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_breakpoint(&self, key: BreakpointKey) -> Result<()> {
        let removed = self.inner.state.lock().await.breakpoints.remove(&key);
        if let Some(binding) = removed.and_then(|info| info.binding) {
            self.inner.send(ClearBreakpointCommand { id: binding.id }).await?;
        }
        Ok(())
    }

    pub async fn set_breakpoint_enabled(&self, key: BreakpointKey, enabled: bool) -> Result<()> {
        self.update_breakpoint(key, |bp, change| {
            bp.enabled = enabled;
            change.enabled = Some(enabled);
        })
        .await
    }

    pub async fn set_breakpoint_condition(
        &self,
        key: BreakpointKey,
        condition: Option<String>,
    ) -> Result<()> {
        self.update_breakpoint(key, |bp, change| {
            change.condition = Some(condition.clone().unwrap_or_default());
            bp.condition = condition;
        })
        .await
    }

    pub async fn set_breakpoint_break_on(&self, key: BreakpointKey, break_on: BreakOn) -> Result<()> {
        self.update_breakpoint(key, |bp, change| {
            bp.break_on = break_on;
            change.ignore_count = Some(break_on.engine_ignore_count().unwrap_or(0));
        })
        .await
    }

    async fn update_breakpoint(
        &self,
        key: BreakpointKey,
        apply: impl FnOnce(&mut Breakpoint, &mut ChangeBreakpointCommand),
    ) -> Result<()> {
        let (id, mut updated) = {
            let state = self.inner.state.lock().await;
            let info = state
                .breakpoints
                .get(&key)
                .ok_or_else(|| CommandError::Failed {
                    command: "changebreakpoint",
                    message: format!("no breakpoint {key}"),
                })?;
            let id = info.binding.as_ref().map(|b| b.id);
            (id, info.breakpoint.clone())
        };
        let mut change = ChangeBreakpointCommand::default();
        apply(&mut updated, &mut change);
        if let Some(id) = id {
            change.id = id;
            self.inner.send(change).await?;
        }
        if let Some(info) = self.inner.state.lock().await.breakpoints.get_mut(&key) {
            info.breakpoint = updated;
        }
        Ok(())
    }

    /// All user breakpoints.
    pub async fn breakpoints(&self) -> Vec<BreakpointInfo> {
        let mut all: Vec<_> = self
            .inner
            .state
            .lock()
            .await
            .breakpoints
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|info| info.key);
        all
    }

    /// Hit counts as reported by the debuggee.
    pub async fn breakpoint_hit_counts(&self) -> Result<HashMap<BreakpointKey, u32>> {
        let by_id = self.inner.send(ListBreakpointsCommand).await?.output;
        let state = self.inner.state.lock().await;
        Ok(by_id
            .into_iter()
            .filter_map(|(id, hits)| Some((state.key_for_binding(id)?, hits)))
            .collect())
    }

    pub async fn set_exception_break(&self, kind: ExceptionBreak, enabled: bool) -> Result<()> {
        self.inner
            .send(SetExceptionBreakCommand { kind, enabled })
            .await?;
        Ok(())
    }

    /// Evaluate in frame `frame`, or globally.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(&self, expression: &str, frame: Option<u32>) -> Result<EvaluationResult> {
        let value = self
            .inner
            .send(EvaluateCommand::expression(expression, frame))
            .await?
            .output;
        Ok(self.inner.state.lock().await.handles.record(value))
    }

    /// The result of calling `toString()` on `value`.
    pub async fn value_to_string(&self, value: &EvaluationResult) -> Result<String> {
        let Some(handle) = self.inner.state.lock().await.handles.check(value)? else {
            return Ok(value.text.clone());
        };
        let result = self
            .inner
            .send(EvaluateCommand::to_string_of(handle, None))
            .await?
            .output;
        Ok(result.text)
    }

    /// Properties of `value`, including its prototype.
    pub async fn children(&self, value: &EvaluationResult) -> Result<Vec<EvaluationResult>> {
        if !value.is_expandable() {
            return Ok(Vec::new());
        }
        let mut lists = self.lookup_many(std::slice::from_ref(value)).await?;
        Ok(lists.pop().unwrap_or_default())
    }

    /// Properties of each value, in order. Values sharing a handle are
    /// looked up once.
    pub async fn lookup_many(
        &self,
        values: &[EvaluationResult],
    ) -> Result<Vec<Vec<EvaluationResult>>> {
        {
            let state = self.inner.state.lock().await;
            for value in values {
                state.handles.check(value)?;
            }
        }
        let lists = self
            .inner
            .send(LookupCommand::from_parents(values))
            .await?
            .output;
        let mut state = self.inner.state.lock().await;
        Ok(lists
            .into_iter()
            .map(|list| state.handles.record_all(list))
            .collect())
    }

    /// Assign `value` to local `name` of `frame`.
    pub async fn set_variable(
        &self,
        frame: u32,
        name: &str,
        value: &EvaluationResult,
    ) -> Result<EvaluationResult> {
        let handle = self.inner.state.lock().await.handles.check(value)?;
        let Some(handle) = handle else {
            return Err(CommandError::Failed {
                command: "setVariableValue",
                message: format!("{} has no handle", value.text),
            }
            .into());
        };
        let result = self
            .inner
            .send(SetVariableValueCommand {
                frame,
                name: name.to_string(),
                handle,
            })
            .await?
            .output;
        Ok(self.inner.state.lock().await.handles.record(result))
    }

    #[tracing::instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        self.inner.resume(ContinueCommand::resume()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn step(&self, kind: SteppingKind) -> Result<()> {
        self.inner.resume(ContinueCommand::step(kind, 1)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn suspend(&self) -> Result<()> {
        self.inner.send(SuspendCommand).await?;
        Ok(())
    }

    /// Loaded scripts, without their source.
    pub async fn scripts(&self) -> Result<Vec<Module>> {
        let command = ScriptsCommand::new(false, None).with_wrapper(self.inner.config.wrapper.clone());
        let modules = self.inner.send(command).await?.output;
        let mut state = self.inner.state.lock().await;
        for module in &modules {
            state.remember_module(module);
        }
        Ok(modules)
    }

    /// A script's source with the module wrapper removed. Fetched once and
    /// cached.
    pub async fn module_source(&self, id: ModuleId) -> Result<String> {
        if let Some(source) = self
            .inner
            .state
            .lock()
            .await
            .modules
            .get(&id)
            .and_then(|m| m.source.clone())
        {
            return Ok(source);
        }

        let command =
            ScriptsCommand::new(true, Some(id)).with_wrapper(self.inner.config.wrapper.clone());
        let fetched = self.inner.send(command).await?.output;
        let Some(module) = fetched.into_iter().find(|m| m.id == id) else {
            return Err(CommandError::Failed {
                command: "scripts",
                message: format!("no script with id {id}"),
            }
            .into());
        };
        let source = module.source.clone().unwrap_or_default();
        let mut state = self.inner.state.lock().await;
        state
            .modules
            .entry(id)
            .and_modify(|known| known.source = Some(source.clone()))
            .or_insert(module);
        Ok(source)
    }

    /// Replace a script's source in the running debuggee and rebind the
    /// breakpoints it holds.
    #[tracing::instrument(skip(self, source))]
    pub async fn live_edit(&self, id: ModuleId, source: &str) -> Result<LiveEditResult> {
        let command = ChangeLiveCommand::new(id, source, &self.inner.config.wrapper);
        let result = self.inner.send(command).await?.output;
        if !result.updated {
            return Ok(result);
        }

        let affected: Vec<BreakpointInfo> = {
            let mut state = self.inner.state.lock().await;
            if let Some(module) = state.modules.get_mut(&id) {
                module.source = Some(source.to_string());
            }
            if let Some(name) = state.modules.get(&id).map(|m| m.name.clone()) {
                state.source_maps.invalidate(Path::new(&name));
            }
            state
                .breakpoints
                .values()
                .filter(|info| info.binding.as_ref().and_then(|b| b.script_id) == Some(id))
                .cloned()
                .collect()
        };

        for info in affected {
            if let Some(old) = &info.binding {
                if let Err(e) = self.inner.send(ClearBreakpointCommand { id: old.id }).await {
                    tracing::debug!(error = %e, id = old.id, "clearing binding before rebind");
                }
            }
            let binding = match self.inner.bind(&info.breakpoint).await {
                Ok(binding) => Some(binding),
                Err(e) => {
                    tracing::warn!(error = %e, key = %info.key, "rebinding breakpoint after live edit");
                    None
                }
            };
            if let Some(entry) = self.inner.state.lock().await.breakpoints.get_mut(&info.key) {
                entry.binding = binding;
            }
        }
        Ok(result)
    }

    /// Run code through the debug listener script.
    pub async fn execute(&self, code: &str) -> Result<ExecutionOutcome> {
        Ok(self.inner.connection.execute(code.to_string()).await?)
    }

    /// Fail the outstanding [`DebugSession::execute`], if any.
    pub async fn cancel_execution(&self) {
        self.inner.connection.cancel_execution().await;
    }

    /// Detach from the debuggee and close the connection.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let result = self.inner.send(DisconnectCommand).await;
        if self.inner.connection.close(SessionError::Disconnected).await {
            self.inner.connection.forward(Inbound::Disconnected);
        }
        result.map(|_| ())
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        if let Some(listener) = &self.listener {
            listener.shutdown();
        }
        self.event_task.abort();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let connection = Arc::clone(&self.inner.connection);
            runtime.spawn(async move {
                connection.close(SessionError::Disconnected).await;
            });
        }
    }
}

impl SessionInner {
    async fn send<C: Command>(&self, command: C) -> Result<Reply<C::Output>> {
        let command = self.factory.create(command);
        let response = self.connection.request(command.to_request()).await?;
        Ok(command.process_response(&response)?)
    }

    async fn resume(&self, command: ContinueCommand) -> Result<()> {
        self.send(command).await?;
        self.state.lock().await.handles.advance();
        Ok(())
    }

    /// Bind `breakpoint`, translating it into the generated script first.
    ///
    /// Conditions and ignore counts are applied in a second step so a bad
    /// condition does not prevent binding; if that step fails the binding
    /// is cleared again.
    async fn bind(&self, breakpoint: &Breakpoint) -> Result<BreakpointBinding> {
        let (target, module, original) = {
            let mut state = self.state.lock().await;
            match state
                .source_maps
                .to_generated(&breakpoint.file, breakpoint.line, breakpoint.column)
            {
                Some(generated) => {
                    let original = OriginalLocation {
                        file: breakpoint.file.clone().into(),
                        line: breakpoint.line,
                        column: breakpoint.column,
                        name: None,
                    };
                    let file = generated.file.to_string_lossy().into_owned();
                    let module = state.module_for_file(&file);
                    let target = Breakpoint {
                        file,
                        line: generated.line,
                        column: generated.column,
                        ..breakpoint.clone()
                    };
                    (target, module, Some(original))
                }
                None => (breakpoint.clone(), state.module_for_file(&breakpoint.file), None),
            }
        };

        let command = SetBreakpointCommand::new(module, target.clone())
            .remote(self.config.remote)
            .with_wrapper(self.config.wrapper.clone());
        let command = if target.has_predicate() {
            command.without_predicate()
        } else {
            command
        };
        let bound = self.send(command).await?.output;

        if target.has_predicate() {
            let change = ChangeBreakpointCommand {
                id: bound.id,
                enabled: Some(target.enabled),
                condition: target.condition.clone(),
                ignore_count: target.break_on.engine_ignore_count(),
            };
            if let Err(e) = self.send(change).await {
                tracing::warn!(error = %e, id = bound.id, "applying breakpoint predicate");
                if let Err(clear) = self.send(ClearBreakpointCommand { id: bound.id }).await {
                    tracing::debug!(error = %clear, "clearing half-bound breakpoint");
                }
                return Err(e);
            }
        }

        Ok(BreakpointBinding {
            id: bound.id,
            script_id: bound.script_id,
            line: bound.line,
            column: bound.column,
            original,
        })
    }

    /// Warn once per session when the debuggee's node no longer speaks this
    /// protocol.
    async fn check_node_version(&self, node: &Path) {
        match server::node_version(node).await {
            Ok(version) if !server::supports_legacy_protocol(&version) => {
                self.warn_legacy_protocol(&version.to_string());
            }
            Ok(version) => tracing::debug!(%version, "debuggee node version"),
            Err(e) => tracing::debug!(error = %e, "could not determine node version"),
        }
    }

    fn warn_legacy_protocol(&self, version: &str) {
        if self
            .warned_legacy_protocol
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.events.send(Event::Warning(format!(
                "node {version} does not support the legacy debugger protocol; use node 7 or older"
            )));
        }
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    async fn process_inbound(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            match message {
                Inbound::Connected => self.emit(Event::Connected),
                Inbound::Event(event) => self.handle_event(event).await,
                Inbound::Output { text, error } => {
                    let stream = if error {
                        OutputStream::Stderr
                    } else {
                        OutputStream::Stdout
                    };
                    self.emit_output(&text, stream).await;
                }
                Inbound::ProcessOutput(OutputLine::Stdout(line)) => {
                    self.emit_output(&format!("{line}\n"), OutputStream::Stdout)
                        .await
                }
                Inbound::ProcessOutput(OutputLine::Stderr(line)) => {
                    self.emit_output(&format!("{line}\n"), OutputStream::Stderr)
                        .await
                }
                Inbound::Disconnected => self.emit(Event::Disconnected),
                Inbound::ProcessExited { exit_code, message } => {
                    self.emit(Event::ProcessExited { exit_code, message })
                }
            }
        }
    }

    async fn emit_output(&self, text: &str, stream: OutputStream) {
        let translated = {
            let mut state = self.state.lock().await;
            match stream {
                OutputStream::Stdout => state.stdout.translate(text),
                OutputStream::Stderr => state.stderr.translate(text),
            }
        };
        self.emit(Event::Output {
            text: translated.text,
            spans: translated.spans,
            stream,
        });
    }

    async fn handle_event(&self, event: transport::Event) {
        let body = event.body.unwrap_or(Value::Null);
        match event.event.as_str() {
            "break" => self.handle_break(&body).await,
            "exception" => {
                let location = self.stop_location(&body).await;
                let exception = {
                    let value = EvaluationResult::from_mirror(
                        None,
                        body.get("exception").unwrap_or(&Value::Null),
                        &Refs::default(),
                    );
                    self.state.lock().await.handles.record(value)
                };
                self.emit(Event::Exception {
                    location,
                    uncaught: body.get("uncaught").and_then(Value::as_bool).unwrap_or(false),
                    exception,
                });
            }
            "afterCompile" => {
                let Some(module) = body.get("script").and_then(module_from_script) else {
                    tracing::debug!("afterCompile without script");
                    return;
                };
                self.state.lock().await.remember_module(&module);
                self.emit(Event::ScriptCompiled(module));
            }
            other => tracing::debug!(event = other, "ignoring event"),
        }
    }

    async fn handle_break(&self, body: &Value) {
        let hit_ids: Vec<i64> = body
            .get("breakpoints")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();

        let (keys, should_stop) = {
            let mut state = self.state.lock().await;
            let mut keys = Vec::new();
            let mut should_stop = hit_ids.is_empty();
            for id in &hit_ids {
                let Some(key) = state.key_for_binding(*id) else {
                    // Not ours; always stop.
                    should_stop = true;
                    continue;
                };
                if let Some(info) = state.breakpoints.get_mut(&key) {
                    info.hit_count += 1;
                    if info.breakpoint.break_on.is_satisfied(info.hit_count)
                        || !info.breakpoint.break_on.needs_client_check()
                    {
                        should_stop = true;
                        keys.push(key);
                    }
                }
            }
            (keys, should_stop)
        };

        if !should_stop {
            tracing::debug!(?hit_ids, "hit count not reached, continuing");
            if let Err(e) = self.resume(ContinueCommand::resume()).await {
                tracing::warn!(error = %e, "continuing after filtered break");
            }
            return;
        }

        let location = self.stop_location(body).await;
        self.emit(Event::Break {
            location,
            breakpoints: keys,
        });
    }

    async fn stop_location(&self, body: &Value) -> StopLocation {
        let line = position_field(body, "sourceLine");
        let engine_column = position_field(body, "sourceColumn");
        let column = self.config.wrapper.from_engine_column(line, engine_column);
        let module = body.get("script").and_then(module_from_script);

        let mut state = self.state.lock().await;
        let original = match &module {
            Some(module) => {
                state.remember_module(module);
                state.source_maps.to_original(&module.name, line, column)
            }
            None => None,
        };
        StopLocation {
            module,
            line,
            column,
            original,
        }
    }
}

/// A zero-based position from an event body; 0 if absent or out of range.
fn position_field(body: &Value, key: &str) -> u32 {
    let Some(value) = body.get(key) else {
        return 0;
    };
    match value.as_u64().map(u32::try_from) {
        Some(Ok(position)) => position,
        _ => {
            tracing::warn!(key, %value, "ignoring invalid position in event");
            0
        }
    }
}

fn module_from_script(script: &Value) -> Option<Module> {
    let id = script.get("id").and_then(Value::as_i64)?;
    let name = script.get("name").and_then(Value::as_str).unwrap_or_default();
    Some(Module::new(id, name))
}
