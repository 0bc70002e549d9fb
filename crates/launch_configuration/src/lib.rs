//! Launch configuration management
//!
//! Reads the `node` launch configurations of VS Code `launch.json` and
//! `.code-workspace` files.

use std::{
    borrow::Cow,
    collections::HashMap,
    path::{Path, PathBuf},
};

use eyre::Context;
use serde::Deserialize;
use server::LaunchArguments;

/// Handle choosing a specific launch configuration, or if the user has not specified one, then
/// present a list of launch configurations they can choose from
#[derive(Debug)]
pub enum ChosenLaunchConfiguration {
    /// A specific launch configuration is available
    Specific(LaunchConfiguration),
    /// The specified launch configuration was not found
    NotFound,
    /// The user did not request a specific launch configuration, so present available options
    ToBeChosen(Vec<String>),
}

#[derive(Deserialize)]
struct VsCodeLaunchConfiguration {
    #[serde(rename = "version")]
    _version: Option<String>,
    configurations: Vec<LaunchConfiguration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFormat {
    VsCode(VsCodeLaunchConfiguration),
    VsCodeWorkspace { launch: VsCodeLaunchConfiguration },
}

impl ConfigFormat {
    fn into_configurations(self) -> Vec<LaunchConfiguration> {
        match self {
            ConfigFormat::VsCode(config) | ConfigFormat::VsCodeWorkspace { launch: config } => {
                config.configurations
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LaunchConfiguration {
    Node(Node),
    /// Configurations for other debuggers are skipped.
    #[serde(other)]
    Unsupported,
}

impl LaunchConfiguration {
    pub fn name(&self) -> Option<&str> {
        match self {
            LaunchConfiguration::Node(node) => Some(&node.name),
            LaunchConfiguration::Unsupported => None,
        }
    }

    pub fn resolve(&mut self, root: impl AsRef<Path>) {
        if let LaunchConfiguration::Node(node) = self {
            node.resolve(root);
        }
    }
}

pub fn load(name: Option<&str>, mut r: impl std::io::Read) -> eyre::Result<ChosenLaunchConfiguration> {
    let mut contents = String::new();
    r.read_to_string(&mut contents)
        .wrap_err("reading configuration contents")?;
    let configuration = from_str(name, &contents).wrap_err("parsing launch configuration")?;
    Ok(configuration)
}

fn from_str(name: Option<&str>, contents: &str) -> eyre::Result<ChosenLaunchConfiguration> {
    let config = jsonc_to_serde(contents).wrap_err("parsing jsonc configuration")?;
    let configurations = config.into_configurations();

    let Some(name) = name else {
        let configuration_names = configurations
            .iter()
            .filter_map(|c| c.name().map(str::to_string))
            .collect();
        return Ok(ChosenLaunchConfiguration::ToBeChosen(configuration_names));
    };

    Ok(configurations
        .into_iter()
        .find(|c| c.name() == Some(name))
        .map(ChosenLaunchConfiguration::Specific)
        .unwrap_or(ChosenLaunchConfiguration::NotFound))
}

fn jsonc_to_serde(input: &str) -> eyre::Result<ConfigFormat> {
    let value = jsonc_parser::parse_to_serde_value(input, &Default::default())
        .wrap_err("parsing jsonc configuration")?;
    let Some(config_format_value) = value else {
        eyre::bail!("no configuration found");
    };

    let config_format =
        serde_json::from_value(config_format_value).wrap_err("deserializing jsonc::Value value")?;
    Ok(config_format)
}

/// Load from a file, resolving `${workspaceFolder}` against the folder that
/// contains it (the parent of `.vscode` for a `launch.json`).
pub fn load_from_path(
    name: Option<&str>,
    path: impl AsRef<Path>,
) -> eyre::Result<ChosenLaunchConfiguration> {
    let path = path.as_ref();
    let f = std::fs::File::open(path).wrap_err("opening input path")?;
    let mut config = crate::load(name, f).context("loading file from given path")?;
    if let ChosenLaunchConfiguration::Specific(configuration) = &mut config {
        configuration.resolve(workspace_root(path));
    }
    Ok(config)
}

fn workspace_root(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or_else(|| Path::new("."));
    match parent.file_name() {
        Some(name) if name == ".vscode" => parent.parent().unwrap_or(parent).to_path_buf(),
        _ => parent.to_path_buf(),
    }
}

/// A `"type": "node"` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub request: String,
    pub program: Option<PathBuf>,
    pub args: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
    pub env: Option<HashMap<String, String>>,
    pub runtime_executable: Option<PathBuf>,
    pub runtime_args: Option<Vec<String>>,
    pub port: Option<u16>,
    pub stop_on_entry: Option<bool>,
}

impl Node {
    fn resolve(&mut self, root: impl AsRef<Path>) {
        let root = root.as_ref();
        for path in [
            &mut self.program,
            &mut self.cwd,
            &mut self.runtime_executable,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_path(path, root);
        }
        if let Some(args) = &mut self.args {
            for arg in args {
                *arg = substitute_workspace_folder(arg, root).into_owned();
            }
        }
    }

    /// Convert a launch request into arguments for spawning the debuggee.
    pub fn to_launch_arguments(&self) -> eyre::Result<LaunchArguments> {
        if self.request != "launch" {
            eyre::bail!(
                "configuration {:?} is a {:?} request, not launch",
                self.name,
                self.request
            );
        }
        let Some(program) = &self.program else {
            eyre::bail!("configuration {:?} has no program", self.name);
        };
        Ok(LaunchArguments {
            node: self.runtime_executable.clone(),
            node_args: self.runtime_args.clone().unwrap_or_default(),
            script: program.clone(),
            script_args: self.args.clone().unwrap_or_default(),
            working_directory: self.cwd.clone(),
            env: self.env.clone().unwrap_or_default(),
            ..Default::default()
        })
    }
}

fn substitute_workspace_folder<'a>(value: &'a str, root: &Path) -> Cow<'a, str> {
    if value.contains("${workspaceFolder}") {
        Cow::Owned(value.replace("${workspaceFolder}", &root.to_string_lossy()))
    } else {
        Cow::Borrowed(value)
    }
}

fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    let substituted = substitute_workspace_folder(&path.to_string_lossy(), root).into_owned();
    let path = PathBuf::from(substituted);
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
        tracing::warn!("cannot determine home directory, using path as-is");
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_workspace_folder() {
        let root = Path::new("/work/project");
        assert_eq!(
            resolve_path(Path::new("${workspaceFolder}/out/app.js"), root),
            PathBuf::from("/work/project/out/app.js")
        );
        assert_eq!(
            resolve_path(Path::new("relative/app.js"), root),
            PathBuf::from("relative/app.js")
        );
    }

    #[test]
    fn expands_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(
            resolve_path(Path::new("~/bin/node"), Path::new("/")),
            home.join("bin/node")
        );
    }

    #[test]
    fn workspace_root_skips_vscode_folder() {
        assert_eq!(
            workspace_root(Path::new("/work/project/.vscode/launch.json")),
            PathBuf::from("/work/project")
        );
        assert_eq!(
            workspace_root(Path::new("/work/project.code-workspace")),
            PathBuf::from("/work")
        );
    }

    #[test]
    fn attach_requests_cannot_launch() {
        let node = Node {
            name: "Attach".to_string(),
            request: "attach".to_string(),
            program: None,
            args: None,
            cwd: None,
            env: None,
            runtime_executable: None,
            runtime_args: None,
            port: Some(5858),
            stop_on_entry: None,
        };
        assert!(node.to_launch_arguments().is_err());
    }
}
