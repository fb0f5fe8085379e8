//! Write the test results of a build into a text file

use super::utils::fail;
use super::{Command, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::models::Squad;
use crate::shortcuts::{download_tests, get_build};
use crate::ui::UI;
use std::path::PathBuf;

pub struct DownloadResultsCommand {
    api: SquadApi,
    group: String,
    project: String,
    build: String,
    environment: Option<String>,
    suite: Option<String>,
    filename: Option<PathBuf>,
}

impl DownloadResultsCommand {
    /// `build` is a version, `latest`, `latest-finished` or an offset such
    /// as `v1.2+1`
    pub fn new(api: SquadApi, group: String, project: String, build: String) -> Self {
        DownloadResultsCommand {
            api,
            group,
            project,
            build,
            environment: None,
            suite: None,
            filename: None,
        }
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_suite(mut self, suite: Option<String>) -> Self {
        self.suite = suite;
        self
    }

    pub fn with_filename(mut self, filename: Option<PathBuf>) -> Self {
        self.filename = filename;
        self
    }
}

impl Command for DownloadResultsCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let api = &self.api;

        let Some(group) = Squad::new(api.clone()).group(&self.group)? else {
            return fail(ui, &format!("Group \"{}\" not found", self.group));
        };

        let Some(project) = group.project(api, &self.project)? else {
            return fail(
                ui,
                &format!("Project \"{}/{}\" not found", self.group, self.project),
            );
        };

        let Some(build) = get_build(api, &self.build, &project)? else {
            return fail(
                ui,
                &format!(
                    "Build \"{}/{}/{}\" not found",
                    self.group, self.project, self.build
                ),
            );
        };

        let environment = match &self.environment {
            Some(slug) => match project.environment(api, slug)? {
                Some(environment) => Some(environment),
                None => return fail(ui, &format!("Environment \"{}\" not found", slug)),
            },
            None => None,
        };

        let suite = match &self.suite {
            Some(slug) => match project.suite(api, slug)? {
                Some(suite) => Some(suite),
                None => return fail(ui, &format!("Suite \"{}\" not found", slug)),
            },
            None => None,
        };

        let path = download_tests(
            api,
            &project,
            &build,
            environment.as_ref(),
            suite.as_ref(),
            self.filename.as_deref(),
        )?;
        ui.output(&format!("Results written to {}", path.display()))?;

        Ok(SUCCESS)
    }

    fn name(&self) -> &str {
        "download-results"
    }

    fn help(&self) -> &str {
        "download test results from SQUAD"
    }
}
