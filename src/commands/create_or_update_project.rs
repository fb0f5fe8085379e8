//! Create a project, or update the settings of an existing one

use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::models::SquadObject;
use crate::shortcuts::{create_or_update_project, ProjectOptions};
use crate::ui::UI;

pub struct CreateOrUpdateProjectCommand {
    api: SquadApi,
    group: String,
    slug: String,
    options: ProjectOptions,
    silent: bool,
}

impl CreateOrUpdateProjectCommand {
    pub fn new(api: SquadApi, group: String, slug: String, options: ProjectOptions) -> Self {
        CreateOrUpdateProjectCommand {
            api,
            group,
            slug,
            options,
            silent: false,
        }
    }

    /// Only report through the exit code
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// `Some(true)` for `--flag`, `Some(false)` for `--no-flag`, `None` when
/// neither was given
pub fn resolve_boolean_flag(flag: bool, no_flag: bool) -> Option<bool> {
    if flag {
        Some(true)
    } else if no_flag {
        Some(false)
    } else {
        None
    }
}

/// Split a comma separated option value
pub fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.split(',').map(|item| item.trim().to_string()).collect())
}

impl Command for CreateOrUpdateProjectCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let update = create_or_update_project(&self.api, &self.group, &self.slug, &self.options)?;

        let Some(project) = &update.project else {
            if !self.silent {
                for error in &update.errors {
                    ui.error(error)?;
                }
            }
            return Ok(FAILURE);
        };

        if self.silent {
            return Ok(if update.errors.is_empty() { SUCCESS } else { FAILURE });
        }

        ui.output(&format!("Project saved: {}", project.url().unwrap_or_default()))?;
        for threshold in &update.thresholds {
            ui.output(&format!(
                "MetricThreshold saved: {}",
                threshold.name.as_deref().unwrap_or_default()
            ))?;
        }

        if !update.errors.is_empty() {
            ui.error(&format!("But some errors were found: {}", update.errors.join("; ")))?;
            return Ok(FAILURE);
        }

        Ok(SUCCESS)
    }

    fn name(&self) -> &str {
        "create-or-update-project"
    }

    fn help(&self) -> &str {
        "Create or update a project in SQUAD"
    }
}
