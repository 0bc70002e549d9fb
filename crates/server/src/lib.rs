//! Launching Node.js debuggees.

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use eyre::WrapErr;
use semver::SemverVersion;

mod debuggee;

pub use debuggee::{Debuggee, OutputLine};

/// How a debuggee should be started.
#[derive(Debug, Clone, Default)]
pub struct LaunchArguments {
    /// Node executable; `node` on the `PATH` when unset.
    pub node: Option<PathBuf>,
    pub node_args: Vec<String>,
    /// Script that hosts the target program and connects back to the
    /// client's listening port. Without one, node itself listens on the
    /// port (`--debug-brk`) and the client attaches.
    pub listener_script: Option<PathBuf>,
    pub script: PathBuf,
    pub script_args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    /// Defaults to the working directory.
    pub node_path: Option<OsString>,
    pub env: HashMap<String, String>,
}

impl LaunchArguments {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    /// Whether the debuggee dials the client rather than listening itself.
    pub fn connects_back(&self) -> bool {
        self.listener_script.is_some()
    }

    /// Locate the node executable.
    pub fn resolve_node(&self) -> eyre::Result<PathBuf> {
        let node = self
            .node
            .clone()
            .unwrap_or_else(|| PathBuf::from("node"));
        if node.components().count() > 1 {
            return Ok(node);
        }
        which::which(&node).map_err(|_| {
            eyre::eyre!(
                "{} not found in PATH. Install Node.js or pass the executable explicitly",
                node.display()
            )
        })
    }

    /// The arguments passed to node for a debug session on `port`.
    pub fn command_arguments(&self, port: u16) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = self.node_args.iter().map(OsString::from).collect();
        match &self.listener_script {
            Some(listener) => {
                arguments.push(listener.into());
                arguments.push(port.to_string().into());
            }
            None => arguments.push(format!("--debug-brk={port}").into()),
        }
        arguments.push(self.script.clone().into());
        arguments.extend(self.script_args.iter().map(OsString::from));
        arguments
    }

    pub(crate) fn effective_node_path(&self) -> Option<OsString> {
        self.node_path
            .clone()
            .or_else(|| self.working_directory.clone().map(PathBuf::into_os_string))
    }
}

/// Ask `node` for its version.
pub async fn node_version(node: &Path) -> eyre::Result<SemverVersion> {
    let output = tokio::process::Command::new(node)
        .arg("--version")
        .output()
        .await
        .wrap_err_with(|| format!("running {} --version", node.display()))?;
    if !output.status.success() {
        eyre::bail!("{} --version exited with {}", node.display(), output.status);
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let version = text
        .trim()
        .parse()
        .wrap_err_with(|| format!("parsing node version {:?}", text.trim()))?;
    tracing::debug!(%version, "detected node version");
    Ok(version)
}

/// The legacy debugger protocol was removed in Node 8.
pub fn supports_legacy_protocol(version: &SemverVersion) -> bool {
    version.precedence_cmp(&SemverVersion::new(8, 0, 0)).is_lt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_back_command_line() {
        let arguments = LaunchArguments {
            node_args: vec!["--harmony".to_string()],
            listener_script: Some(PathBuf::from("/opt/listener.js")),
            script_args: vec!["--verbose".to_string()],
            ..LaunchArguments::new("app.js")
        };
        assert_eq!(
            arguments.command_arguments(5858),
            vec!["--harmony", "/opt/listener.js", "5858", "app.js", "--verbose"]
        );
        assert!(arguments.connects_back());
    }

    #[test]
    fn debug_break_command_line() {
        let arguments = LaunchArguments::new("app.js");
        assert_eq!(
            arguments.command_arguments(9229),
            vec!["--debug-brk=9229", "app.js"]
        );
    }

    #[test]
    fn node_path_defaults_to_working_directory() {
        let mut arguments = LaunchArguments {
            working_directory: Some(PathBuf::from("/project")),
            ..LaunchArguments::new("app.js")
        };
        assert_eq!(arguments.effective_node_path(), Some("/project".into()));

        arguments.node_path = Some("/custom".into());
        assert_eq!(arguments.effective_node_path(), Some("/custom".into()));
    }

    #[test]
    fn explicit_node_path_is_not_searched() {
        let arguments = LaunchArguments {
            node: Some(PathBuf::from("/usr/local/bin/node")),
            ..LaunchArguments::new("app.js")
        };
        assert_eq!(
            arguments.resolve_node().unwrap(),
            PathBuf::from("/usr/local/bin/node")
        );
    }

    #[test]
    fn legacy_protocol_cutoff() {
        let version = |v: &str| SemverVersion::parse(v).unwrap();
        assert!(supports_legacy_protocol(&version("v6.11.0")));
        assert!(supports_legacy_protocol(&version("7.10.1")));
        assert!(!supports_legacy_protocol(&version("8.0.0")));
        assert!(!supports_legacy_protocol(&version("v10.0.0")));
    }
}
