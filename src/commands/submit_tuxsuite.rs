//! Register TuxSuite builds and tests as SQUAD watch jobs
//!
//! SQUAD's TuxSuite backend fetches the actual results; the client only
//! tells it which jobs to follow.

use super::utils::{group_project, or_exit};
use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::tux::load_results_file;
use crate::ui::UI;
use std::path::PathBuf;

pub struct SubmitTuxSuiteCommand {
    api: SquadApi,
    group: String,
    project: String,
    build: Option<String>,
    backend: String,
    results: PathBuf,
    fetch_now: bool,
}

impl SubmitTuxSuiteCommand {
    pub fn new(
        api: SquadApi,
        group: String,
        project: String,
        backend: String,
        results: PathBuf,
    ) -> Self {
        SubmitTuxSuiteCommand {
            api,
            group,
            project,
            build: None,
            backend,
            results,
            fetch_now: false,
        }
    }

    /// Use this build version instead of the one in the first build's
    /// `status.json`
    pub fn with_build(mut self, build: Option<String>) -> Self {
        self.build = build;
        self
    }

    /// Have SQUAD fetch results right away instead of waiting for TuxSuite
    /// to call back
    pub fn with_fetch_now(mut self, fetch_now: bool) -> Self {
        self.fetch_now = fetch_now;
        self
    }
}

impl Command for SubmitTuxSuiteCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let results = or_exit!(ui, load_results_file(&self.results));

        let build = match &self.build {
            Some(build) => build.clone(),
            None => match results.build_version() {
                Ok(version) => version,
                Err(e) => {
                    ui.error(&format!("Failed to retrieve tuxsuite build: {}", e))?;
                    return Ok(FAILURE);
                }
            },
        };

        let ok = results.submit(
            &self.api,
            &group_project(&self.group, &self.project),
            &build,
            &self.backend,
            !self.fetch_now,
        )?;

        Ok(if ok { SUCCESS } else { FAILURE })
    }

    fn name(&self) -> &str {
        "submit-tuxsuite"
    }

    fn help(&self) -> &str {
        "submit TuxSuite results to SQUAD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn command(server: &Server, results: PathBuf) -> SubmitTuxSuiteCommand {
        SubmitTuxSuiteCommand::new(
            SquadApi::configure(&server.url(), Some("token")).unwrap(),
            "my_group".to_string(),
            "my_project".to_string(),
            "tuxsuite.com".to_string(),
            results,
        )
    }

    #[test]
    fn test_submit_tuxsuite_build_version_from_status() {
        let mut server = Server::new();
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.json");
        let builds = json!([{
            "uid": "1t2giSA1sSKFADKPrl0YI1gjMLb",
            "project": "tuxsuite/alice",
            "build_name": "",
            "target_arch": "x86_64",
            "download_url": format!("{}/tuxsuite/alice/1t2giSA1sSKFADKPrl0YI1gjMLb/", server.url()),
        }]);
        fs::write(&path, builds.to_string()).unwrap();

        server
            .mock("GET", "/tuxsuite/alice/1t2giSA1sSKFADKPrl0YI1gjMLb/status.json")
            .with_body(json!({"git-describe": "next-20211224"}).to_string())
            .create();
        let watch = server
            .mock("POST", "/api/watchjob/my_group/my_project/next-20211224/x86_64")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("backend".into(), "tuxsuite.com".into()),
                Matcher::UrlEncoded(
                    "testjob_id".into(),
                    "BUILD:tuxsuite@alice#1t2giSA1sSKFADKPrl0YI1gjMLb".into(),
                ),
                Matcher::UrlEncoded("delay_fetch".into(), "true".into()),
            ]))
            .with_status(201)
            .expect(1)
            .create();

        let mut ui = TestUI::new();
        assert_eq!(command(&server, path).execute(&mut ui).unwrap(), SUCCESS);
        watch.assert();
    }

    #[test]
    fn test_submit_tuxsuite_fetch_now() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.json");
        let test = json!({
            "uid": "1yPYGaOEPNwr2pfqBgONY43zORp",
            "project": "tuxsuite/alice",
            "device": "qemu-arm64",
        });
        fs::write(&path, test.to_string()).unwrap();

        let mut server = Server::new();
        let watch = server
            .mock("POST", "/api/watchjob/my_group/my_project/my_build/qemu-arm64")
            .match_body(Matcher::Exact(
                "backend=tuxsuite.com&testjob_id=TEST%3Atuxsuite%40alice%231yPYGaOEPNwr2pfqBgONY43zORp"
                    .into(),
            ))
            .with_status(201)
            .expect(1)
            .create();

        let mut ui = TestUI::new();
        let cmd = command(&server, path)
            .with_build(Some("my_build".to_string()))
            .with_fetch_now(true);
        assert_eq!(cmd.execute(&mut ui).unwrap(), SUCCESS);
        watch.assert();
    }

    #[test]
    fn test_submit_tuxsuite_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plan.json");
        fs::write(&path, "{\"builds\": ").unwrap();

        let server = Server::new();
        let mut ui = TestUI::new();
        assert_eq!(command(&server, path).execute(&mut ui).unwrap(), FAILURE);
        assert_eq!(ui.errors.len(), 1);
    }
}
