use std::path::PathBuf;

use launch_configuration::{ChosenLaunchConfiguration, LaunchConfiguration};

#[ctor::ctor]
fn init() {
    let _ = color_eyre::install();
}

fn testdata_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

#[test]
fn test_read_launch_json() {
    let path = "./testdata/vscode/launch.json";
    let ChosenLaunchConfiguration::Specific(LaunchConfiguration::Node(config)) =
        launch_configuration::load_from_path(Some("Launch Program"), path).unwrap()
    else {
        panic!("specified launch configuration not found");
    };

    assert_eq!(config.name, "Launch Program");
    assert_eq!(config.request, "launch");
    assert_eq!(config.stop_on_entry, Some(true));

    // launch.json lives in testdata/vscode, so that directory is the workspace
    let root = PathBuf::from("./testdata/vscode");
    assert_eq!(config.program, Some(root.join("out/app.js")));
    assert_eq!(config.cwd, Some(root.clone()));

    let arguments = config.to_launch_arguments().unwrap();
    assert_eq!(arguments.node, Some(PathBuf::from("/usr/local/bin/node")));
    assert_eq!(arguments.node_args, vec!["--harmony".to_string()]);
    assert_eq!(
        arguments.script_args,
        vec![
            "--port".to_string(),
            "8080".to_string(),
            format!("{}/data", root.display()),
        ]
    );
    assert_eq!(arguments.env.get("NODE_ENV").map(String::as_str), Some("development"));
}

#[test]
fn test_list_node_configurations() {
    let path = testdata_root().join("vscode/launch.json");
    let ChosenLaunchConfiguration::ToBeChosen(names) =
        launch_configuration::load_from_path(None, path).unwrap()
    else {
        panic!("expected a list of configurations");
    };
    assert_eq!(names, vec!["Launch Program", "Attach to Process"]);
}

#[test]
fn test_non_node_configuration_is_not_found() {
    let path = testdata_root().join("vscode/launch.json");
    let chosen =
        launch_configuration::load_from_path(Some("Python: Current File"), path).unwrap();
    assert!(matches!(chosen, ChosenLaunchConfiguration::NotFound));
}

#[test]
fn test_read_code_workspace() {
    let path = testdata_root().join("vscode/project.code-workspace");
    let ChosenLaunchConfiguration::Specific(LaunchConfiguration::Node(config)) =
        launch_configuration::load_from_path(Some("Server"), path).unwrap()
    else {
        panic!("specified launch configuration not found");
    };
    assert_eq!(config.program, Some(PathBuf::from("server.js")));
    assert!(config.runtime_executable.is_none());
}

#[test]
fn test_malformed_json() {
    let input = b"not valid json {{{" as &[u8];
    let result = launch_configuration::load(None, input);
    assert!(result.is_err());
}

#[test]
fn test_empty_input() {
    let input = b"" as &[u8];
    let result = launch_configuration::load(None, input);
    assert!(result.is_err());
}
