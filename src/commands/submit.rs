//! Submit test results, metrics, metadata, logs and attachments
//!
//! Results come either from a single `--result-name`/`--result-value` pair,
//! from a JSON/YAML `--results` file, or from a TuxBuild `build.json` when
//! `--results-layout tuxbuild` is given. In the TuxBuild layout each build
//! carries its own version and environment.

use super::utils::{fail, group_project, or_exit};
use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::input::{check_file, read_input_file, read_text_file};
use crate::shortcuts::{submit_results, Results};
use crate::tux::load_builds;
use crate::ui::UI;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Accepted values of `--result-value`
pub const RESULT_VALUES: &[&str] = &["pass", "fail", "skip"];

/// Format of the `--results` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResultsLayout {
    Tuxbuild,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitArgs {
    pub group: String,
    pub project: String,
    pub build: Option<String>,
    pub environment: Option<String>,
    pub results: Option<PathBuf>,
    pub result_name: Option<String>,
    pub result_value: Option<String>,
    pub results_layout: Option<ResultsLayout>,
    pub metrics: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub logs: Option<PathBuf>,
    pub attachments: Vec<PathBuf>,
}

pub struct SubmitCommand {
    api: SquadApi,
    args: SubmitArgs,
}

/// Tests of one test run: build version, environment and the tests map
type Batch = (String, String, Option<Value>);

impl SubmitCommand {
    pub fn new(api: SquadApi, args: SubmitArgs) -> Self {
        SubmitCommand { api, args }
    }

    fn build_and_environment(&self) -> Option<(String, String)> {
        match (&self.args.build, &self.args.environment) {
            (Some(build), Some(environment)) => Some((build.clone(), environment.clone())),
            _ => None,
        }
    }
}

impl Command for SubmitCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let args = &self.args;

        if args.result_name.is_some() && args.results.is_some() {
            return fail(ui, "--result-name and --results are mutually exclusive");
        }

        if args.result_name.is_none() && args.results.is_none() && args.metrics.is_none() {
            return fail(ui, "At least one of --result-name, --results, --metrics is required");
        }

        let tuxbuild = args.results_layout == Some(ResultsLayout::Tuxbuild);
        if tuxbuild && args.results.is_none() {
            return fail(ui, "--results-layout requires --results");
        }

        let mut batches: Vec<Batch> = Vec::new();

        if let Some(name) = &args.result_name {
            let value = match args.result_value.as_deref() {
                Some(value) if RESULT_VALUES.contains(&value) => value,
                Some(value) => {
                    return fail(
                        ui,
                        &format!(
                            "Invalid result value \"{}\", choose from {}",
                            value,
                            RESULT_VALUES.join(", ")
                        ),
                    )
                }
                None => return fail(ui, "Test result value is required"),
            };
            let Some((build, environment)) = self.build_and_environment() else {
                return fail(ui, "--environment and --build arguments are mandatory");
            };
            let mut tests = Map::new();
            tests.insert(name.clone(), Value::from(value));
            batches.push((build, environment, Some(Value::Object(tests))));
        }

        if let Some(path) = &args.results {
            if tuxbuild {
                let ignored = [
                    ("environment", args.environment.is_some()),
                    ("build", args.build.is_some()),
                ];
                for (flag, given) in ignored {
                    if given {
                        let message = format!(
                            "Deprecation notice: --{} is being ignored when using --results-layout=tuxbuild. Future releases will cause it to break",
                            flag
                        );
                        ui.warning(&message)?;
                    }
                }

                for build in or_exit!(ui, load_builds(path)) {
                    batches.push((build.git_describe.clone(), build.target_arch.clone(), Some(build.tests())));
                }
            } else {
                let Some((build, environment)) = self.build_and_environment() else {
                    return fail(ui, "--environment and --build arguments are mandatory");
                };
                batches.push((build, environment, Some(or_exit!(ui, read_input_file(path)))));
            }
        }

        let metrics = match &args.metrics {
            Some(path) => Some(or_exit!(ui, read_input_file(path))),
            None => None,
        };

        if batches.is_empty() {
            // Only metrics were given
            let Some((build, environment)) = self.build_and_environment() else {
                return fail(ui, "--environment and --build arguments are mandatory");
            };
            batches.push((build, environment, None));
        }

        let metadata = match &args.metadata {
            Some(path) => Some(or_exit!(ui, read_input_file(path))),
            None => None,
        };

        let log = match &args.logs {
            Some(path) => Some(or_exit!(ui, read_text_file(path))),
            None => None,
        };

        for attachment in &args.attachments {
            or_exit!(ui, check_file(attachment));
        }

        let slug = group_project(&args.group, &args.project);
        let mut ok = true;
        for (build, environment, tests) in batches {
            let results = Results {
                tests,
                metrics: metrics.clone(),
                metadata: metadata.clone(),
                log: log.clone(),
                attachments: args.attachments.clone(),
            };
            ok &= or_exit!(ui, submit_results(&self.api, &slug, &build, &environment, &results));
        }

        Ok(if ok { SUCCESS } else { FAILURE })
    }

    fn name(&self) -> &str {
        "submit"
    }

    fn help(&self) -> &str {
        "submit results to SQUAD"
    }
}
