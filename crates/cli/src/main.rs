use std::{
    cmp::Ordering,
    io::IsTerminal,
    net::SocketAddr,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, Context};
use debugger::{
    Backtrace, DebugSession, Event, EventReceiver, OutputStream, SessionConfig, StopLocation,
};
use launch_configuration::{ChosenLaunchConfiguration, LaunchConfiguration};
use semver::SemverVersion;
use server::LaunchArguments;
use sourcemap::Position;
use tracing_subscriber::EnvFilter;

use crate::breakpoint::BreakpointArg;

mod breakpoint;

/// Frames printed for each stop.
const BACKTRACE_DEPTH: u32 = 20;

#[derive(Debug, Parser)]
#[command(name = "ndbg", about = "Debug node programs over the legacy V8 debugger protocol")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script, printing a backtrace every time it stops.
    Launch {
        /// Script to run. Taken from the launch configuration when --config
        /// is given.
        script: Option<PathBuf>,

        /// Node executable.
        #[clap(long)]
        node: Option<PathBuf>,

        /// Debug listener script that connects back to the debugger.
        #[clap(long)]
        listener: Option<PathBuf>,

        /// Breakpoint as FILE:LINE; may be repeated.
        #[clap(short, long = "break")]
        breakpoints: Vec<BreakpointArg>,

        /// VS Code launch.json or .code-workspace file.
        #[clap(short, long, requires = "name")]
        config: Option<PathBuf>,

        /// Launch configuration to use from --config.
        #[clap(short, long)]
        name: Option<String>,

        /// Break on all exceptions, not only uncaught ones.
        #[clap(long)]
        all_exceptions: bool,
    },

    /// Print the original position of a generated position.
    Map {
        generated: PathBuf,
        /// One-based line.
        line: u32,
        /// One-based column.
        column: u32,
    },

    /// Compare two semantic versions.
    Compare { left: String, right: String },
}

/// How to reach the debuggee.
enum Target {
    Launch(LaunchArguments),
    Attach(SocketAddr),
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    color_eyre::install().context("installing color_eyre")?;
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);
    if std::io::stderr().is_terminal() || in_ci {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .json()
            .init();
    }

    let args = Args::parse();
    tracing::debug!(?args, "parsed command line arguments");

    match args.command {
        Command::Launch {
            script,
            node,
            listener,
            breakpoints,
            config,
            name,
            all_exceptions,
        } => {
            let target = match config {
                Some(config) => {
                    let name = name.unwrap_or_default();
                    target_from_configuration(&config, &name)?
                }
                None => {
                    let Some(script) = script else {
                        eyre::bail!("a script or --config is required");
                    };
                    let mut arguments = LaunchArguments::new(script);
                    arguments.node = node;
                    arguments.listener_script = listener;
                    Target::Launch(arguments)
                }
            };
            run(target, &breakpoints, all_exceptions).await
        }
        Command::Map {
            generated,
            line,
            column,
        } => {
            map_position(&generated, line, column)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Compare { left, right } => {
            compare(&left, &right)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn target_from_configuration(path: &Path, name: &str) -> eyre::Result<Target> {
    let chosen = launch_configuration::load_from_path(Some(name), path)
        .wrap_err_with(|| format!("loading {}", path.display()))?;
    let node = match chosen {
        ChosenLaunchConfiguration::Specific(LaunchConfiguration::Node(node)) => node,
        ChosenLaunchConfiguration::Specific(LaunchConfiguration::Unsupported) => {
            eyre::bail!("configuration {name:?} is not a node configuration")
        }
        ChosenLaunchConfiguration::NotFound => {
            eyre::bail!("no configuration named {name:?} in {}", path.display())
        }
        ChosenLaunchConfiguration::ToBeChosen(names) => {
            eyre::bail!("choose a configuration with --name: {}", names.join(", "))
        }
    };

    if node.request == "attach" {
        let port = node.port.unwrap_or(5858);
        return Ok(Target::Attach(SocketAddr::from(([127, 0, 0, 1], port))));
    }
    Ok(Target::Launch(node.to_launch_arguments()?))
}

async fn run(
    target: Target,
    breakpoints: &[BreakpointArg],
    all_exceptions: bool,
) -> eyre::Result<ExitCode> {
    let config = SessionConfig::default();
    let (session, mut events, paused_on_start) = match target {
        Target::Launch(arguments) => {
            let (session, events) = DebugSession::launch(&arguments, config)
                .await
                .wrap_err("launching debuggee")?;
            (session, events, !arguments.connects_back())
        }
        Target::Attach(addr) => {
            let (session, events) = DebugSession::attach(addr, config)
                .await
                .wrap_err_with(|| format!("attaching to {addr}"))?;
            (session, events, false)
        }
    };

    for arg in breakpoints {
        let mut breakpoint = arg.to_breakpoint();
        if let Ok(absolute) = std::path::absolute(&breakpoint.file) {
            breakpoint.file = absolute.to_string_lossy().into_owned();
        }
        match session.set_breakpoint(breakpoint).await {
            Ok(info) => tracing::debug!(key = %info.key, binding = ?info.binding, "breakpoint set"),
            Err(e) if e.is_fatal() => return Err(e).wrap_err("setting breakpoints"),
            Err(e) => eprintln!("could not set breakpoint {}:{}: {e}", arg.file, arg.line),
        }
    }

    let exceptions = if all_exceptions {
        debugger::ExceptionBreak::All
    } else {
        debugger::ExceptionBreak::Uncaught
    };
    if let Err(e) = session.set_exception_break(exceptions, true).await {
        tracing::warn!(error = %e, "enabling exception breaks");
    }

    if paused_on_start {
        session.resume().await.wrap_err("starting the script")?;
    }

    event_loop(&session, &mut events).await
}

async fn event_loop(session: &DebugSession, events: &mut EventReceiver) -> eyre::Result<ExitCode> {
    let attached = session
        .listener()
        .is_some_and(|listener| listener.process_id().is_none());

    while let Some(event) = events.recv().await {
        match event {
            Event::Connected => tracing::debug!("debuggee connected"),
            Event::Break { location, .. } => {
                println!("stopped at {}", describe(&location));
                print_backtrace(session).await;
                resume(session).await?;
            }
            Event::Exception {
                location,
                uncaught,
                exception,
            } => {
                let kind = if uncaught { "uncaught exception" } else { "exception" };
                println!("{kind} at {}: {}", describe(&location), exception.text);
                print_backtrace(session).await;
                resume(session).await?;
            }
            Event::ScriptCompiled(module) => tracing::debug!(id = module.id, name = %module.name, "script compiled"),
            Event::Output { text, stream, .. } => match stream {
                OutputStream::Stdout => print!("{text}"),
                OutputStream::Stderr => eprint!("{text}"),
            },
            Event::Warning(message) => eprintln!("warning: {message}"),
            Event::Disconnected => {
                tracing::debug!("debuggee disconnected");
                if attached {
                    return Ok(ExitCode::SUCCESS);
                }
            }
            Event::ProcessExited { exit_code, message } => {
                println!("{message}");
                let code = exit_code
                    .and_then(|code| u8::try_from(code).ok())
                    .unwrap_or(1);
                return Ok(ExitCode::from(code));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn resume(session: &DebugSession) -> eyre::Result<()> {
    match session.resume().await {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => {
            tracing::debug!(error = %e, "debuggee went away while resuming");
            Ok(())
        }
        Err(e) => Err(e).wrap_err("resuming execution"),
    }
}

async fn print_backtrace(session: &DebugSession) {
    match session.backtrace(0, BACKTRACE_DEPTH).await {
        Ok(backtrace) => print!("{}", format_backtrace(&backtrace)),
        Err(e) => eprintln!("could not fetch backtrace: {e}"),
    }
}

fn format_backtrace(backtrace: &Backtrace) -> String {
    let mut out = String::new();
    for frame in &backtrace.frames {
        let position = match (&frame.original, &frame.module) {
            (Some(original), _) => format!(
                "{}:{}:{}",
                original.file.display(),
                original.line + 1,
                original.column + 1
            ),
            (None, Some(module)) => {
                format!("{}:{}:{}", module.name, frame.line + 1, frame.column + 1)
            }
            (None, None) => "<unknown>".to_string(),
        };
        out.push_str(&format!(
            "  #{} {} at {}\n",
            frame.index, frame.function_name, position
        ));
    }
    if backtrace.total_frames as usize > backtrace.frames.len() {
        out.push_str(&format!(
            "  ... {} more\n",
            backtrace.total_frames as usize - backtrace.frames.len()
        ));
    }
    out
}

fn describe(location: &StopLocation) -> String {
    match location.display_position() {
        Some((file, line, column)) => format!("{}:{}:{}", file.display(), line + 1, column + 1),
        None => "<unknown>".to_string(),
    }
}

fn map_position(generated: &Path, line: u32, column: u32) -> eyre::Result<()> {
    let map = sourcemap::locate::load_for_generated_file(generated)
        .wrap_err_with(|| format!("loading the source map for {}", generated.display()))?;
    let Some(map) = map else {
        eyre::bail!("{} has no sourceMappingURL comment", generated.display());
    };
    let Some(point) = map.original_position_for(Position::new(line, column)) else {
        eyre::bail!("no mapping for {}:{line}:{column}", generated.display());
    };
    let source = point
        .source
        .map(|source| source.path.clone())
        .unwrap_or_default();
    match point.name {
        Some(name) => println!(
            "{source}:{}:{} ({name})",
            point.position.line, point.position.column
        ),
        None => println!("{source}:{}:{}", point.position.line, point.position.column),
    }
    Ok(())
}

fn compare(left: &str, right: &str) -> eyre::Result<()> {
    let l: SemverVersion = left.parse().wrap_err_with(|| format!("parsing {left:?}"))?;
    let r: SemverVersion = right.parse().wrap_err_with(|| format!("parsing {right:?}"))?;
    let symbol = match l.cmp(&r) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    println!("{l} {symbol} {r}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_launch_arguments() {
        let args = Args::try_parse_from([
            "ndbg", "launch", "app.js", "--break", "app.ts:3", "-b", "lib.ts:10",
        ])
        .unwrap();
        let Command::Launch {
            script,
            breakpoints,
            ..
        } = args.command
        else {
            panic!("expected launch");
        };
        assert_eq!(script, Some(PathBuf::from("app.js")));
        assert_eq!(breakpoints.len(), 2);
        assert_eq!(breakpoints[1].line, 10);
    }

    #[test]
    fn config_requires_name() {
        assert!(Args::try_parse_from(["ndbg", "launch", "--config", "launch.json"]).is_err());
    }

    #[test]
    fn backtrace_formatting() {
        let backtrace = Backtrace {
            total_frames: 3,
            frames: vec![debugger::StackFrame {
                index: 0,
                line: 4,
                column: 2,
                function_name: "main".to_string(),
                module: Some(debugger::Module::new(1, "/srv/app.js")),
                locals: Vec::new(),
                arguments: Vec::new(),
                original: None,
            }],
        };
        assert_eq!(
            format_backtrace(&backtrace),
            "  #0 main at /srv/app.js:5:3\n  ... 2 more\n"
        );
    }
}
