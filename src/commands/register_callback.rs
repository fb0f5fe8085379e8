//! Register a URL to be called when a build finishes

use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::shortcuts::register_callback;
use crate::ui::UI;

pub struct RegisterCallbackCommand {
    api: SquadApi,
    group: String,
    project: String,
    build: String,
    url: String,
    record_response: bool,
}

impl RegisterCallbackCommand {
    pub fn new(
        api: SquadApi,
        group: String,
        project: String,
        build: String,
        url: String,
        record_response: bool,
    ) -> Self {
        RegisterCallbackCommand {
            api,
            group,
            project,
            build,
            url,
            record_response,
        }
    }
}

impl Command for RegisterCallbackCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let (ok, errors) = register_callback(
            &self.api,
            &self.group,
            &self.project,
            &self.build,
            &self.url,
            self.record_response,
        )?;

        for error in &errors {
            ui.error(error)?;
        }

        Ok(if ok { SUCCESS } else { FAILURE })
    }

    fn name(&self) -> &str {
        "register-callback"
    }

    fn help(&self) -> &str {
        "Register callback to a build in SQUAD"
    }
}
