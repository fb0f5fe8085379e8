//! Ask SQUAD to submit a job definition to one of its backends

use super::utils::group_project;
use super::{Command, FAILURE, SUCCESS, USAGE_ERROR};
use crate::api::SquadApi;
use crate::error::Result;
use crate::input::read_text_file;
use crate::shortcuts::submit_job;
use crate::ui::UI;
use std::path::PathBuf;

pub struct SubmitJobCommand {
    api: SquadApi,
    group: String,
    project: String,
    build: String,
    environment: String,
    backend: String,
    definition: PathBuf,
}

impl SubmitJobCommand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: SquadApi,
        group: String,
        project: String,
        build: String,
        environment: String,
        backend: String,
        definition: PathBuf,
    ) -> Self {
        SubmitJobCommand {
            api,
            group,
            project,
            build,
            environment,
            backend,
            definition,
        }
    }
}

impl Command for SubmitJobCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        // An unreadable definition is an invocation error
        let definition = match read_text_file(&self.definition) {
            Ok(definition) => definition,
            Err(e) => {
                ui.error(&format!("Definition file: {}", e))?;
                return Ok(USAGE_ERROR);
            }
        };

        let ok = submit_job(
            &self.api,
            &group_project(&self.group, &self.project),
            &self.build,
            &self.environment,
            &self.backend,
            &definition,
        )?;

        Ok(if ok { SUCCESS } else { FAILURE })
    }

    fn name(&self) -> &str {
        "submit-job"
    }

    fn help(&self) -> &str {
        "submit job requests to SQUAD"
    }
}
