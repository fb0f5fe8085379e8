//! Error path testing
//!
//! These tests check that failures surface as the right error kind, and
//! that commands report them through the UI with a failing exit code.

use mockito::{Matcher, Server};
use squad_client::api::{Filters, SquadApi};
use squad_client::commands::{
    Command, ReportCommand, ShellCommand, SubmitArgs, SubmitCommand, FAILURE,
};
use squad_client::config::ClientConfig;
use squad_client::error::{Error, Result};
use squad_client::models::{Count, Group, Squad, SquadObject};
use squad_client::ui::UI;
use std::fs;
use tempfile::TempDir;

// Test UI implementation
struct TestUI {
    pub output: Vec<String>,
    pub errors: Vec<String>,
}

impl TestUI {
    fn new() -> Self {
        TestUI {
            output: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl UI for TestUI {
    fn output(&mut self, message: &str) -> Result<()> {
        self.output.push(message.to_string());
        Ok(())
    }

    fn error(&mut self, message: &str) -> Result<()> {
        self.errors.push(message.to_string());
        Ok(())
    }

    fn warning(&mut self, message: &str) -> Result<()> {
        self.errors.push(format!("Warning: {}", message));
        Ok(())
    }
}

fn submit_args(results: std::path::PathBuf) -> SubmitArgs {
    SubmitArgs {
        group: "lkft".to_string(),
        project: "linux".to_string(),
        build: Some("v1".to_string()),
        environment: Some("x86".to_string()),
        results: Some(results),
        ..Default::default()
    }
}

#[test]
fn test_malformed_host() {
    for url in ["", "http:/malformed/url", "qa-reports.linaro.org"] {
        let result = SquadApi::configure(url, None);
        assert!(matches!(result, Err(Error::MalformedUrl(_))), "{}", url);
    }
}

#[test]
fn test_unauthorized_without_token() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/groups/")
        .match_query(Matcher::Any)
        .with_status(401)
        .create();

    let squad = Squad::new(SquadApi::configure(&server.url(), None).unwrap());
    let result = squad.groups(&Filters::new(), Count::DEFAULT);

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert!(err.to_string().contains("SQUAD_TOKEN"));
}

#[test]
fn test_forbidden_with_token() {
    let mut server = Server::new();
    server
        .mock("GET", "/api/groups/")
        .match_query(Matcher::Any)
        .with_status(403)
        .create();

    let squad = Squad::new(SquadApi::configure(&server.url(), Some("wrong")).unwrap());
    let result = squad.groups(&Filters::new(), Count::DEFAULT);

    assert!(matches!(result, Err(Error::Forbidden(_))));
}

#[test]
fn test_save_rejected() {
    let mut server = Server::new();
    server
        .mock("POST", "/api/groups/")
        .with_status(400)
        .with_body(r#"{"slug": ["group with this slug already exists."]}"#)
        .create();

    let api = SquadApi::configure(&server.url(), Some("secret")).unwrap();
    let mut group = Group::with_slug("lkft");

    match group.save(&api) {
        Err(Error::SaveFailed { kind, reason }) => {
            assert_eq!(kind, "Group");
            assert!(reason.contains("already exists"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_submit_missing_results_file() {
    let temp = TempDir::new().unwrap();
    let server = Server::new();
    let mut ui = TestUI::new();

    let cmd = SubmitCommand::new(
        SquadApi::configure(&server.url(), None).unwrap(),
        submit_args(temp.path().join("missing.json")),
    );

    assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    assert_eq!(ui.errors.len(), 1);
    assert!(ui.errors[0].contains("file does not exist"));
}

#[test]
fn test_submit_unsupported_extension() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results.txt");
    fs::write(&results, "boot: pass\n").unwrap();

    let server = Server::new();
    let mut ui = TestUI::new();
    let cmd = SubmitCommand::new(
        SquadApi::configure(&server.url(), None).unwrap(),
        submit_args(results),
    );

    assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    assert!(ui.errors[0].contains("JSON or YAML"));
}

#[test]
fn test_submit_malformed_yaml() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results.yaml");
    fs::write(&results, "boot: [pass\n").unwrap();

    let mut server = Server::new();
    let submit = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();

    let mut ui = TestUI::new();
    let cmd = SubmitCommand::new(
        SquadApi::configure(&server.url(), None).unwrap(),
        submit_args(results),
    );

    assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    assert!(ui.errors[0].contains("Failed parsing file"));
    submit.assert();
}

#[test]
fn test_submit_yaml_non_string_key() {
    let temp = TempDir::new().unwrap();
    let results = temp.path().join("results.yaml");
    fs::write(&results, "suite/test1: pass\n1: fail\n").unwrap();

    let mut server = Server::new();
    let submit = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create();

    let mut ui = TestUI::new();
    let cmd = SubmitCommand::new(
        SquadApi::configure(&server.url(), None).unwrap(),
        submit_args(results),
    );

    assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    assert_eq!(ui.errors, vec!["Validation error: Non-string key detected"]);
    submit.assert();
}

#[test]
fn test_report_missing_descriptor() {
    let temp = TempDir::new().unwrap();
    let server = Server::new();
    let mut ui = TestUI::new();

    let cmd = ReportCommand::new(
        ClientConfig::new(server.url()),
        temp.path().join("reports.yaml"),
    );

    assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    assert!(ui.output.is_empty());
    assert_eq!(ui.errors.len(), 1);
}

#[test]
fn test_shell_missing_script() {
    let temp = TempDir::new().unwrap();
    let server = Server::new();
    let mut ui = TestUI::new();

    let cmd = ShellCommand::new(
        SquadApi::configure(&server.url(), None).unwrap(),
        Some(temp.path().join("queries")),
    );

    assert!(matches!(cmd.execute(&mut ui), Err(Error::InputFile { .. })));
}

#[test]
fn test_connection_refused() {
    // Nothing listens on the discard port of localhost in the test sandbox
    let api = SquadApi::configure("http://127.0.0.1:9", None).unwrap();
    let result = Squad::new(api).groups(&Filters::new(), Count::DEFAULT);

    assert!(matches!(
        result,
        Err(Error::Connection(_)) | Err(Error::Timeout(_)) | Err(Error::Request(_))
    ));
}
