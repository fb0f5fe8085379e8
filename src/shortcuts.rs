//! High level operations behind the CLI commands

use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use crate::models::submit::{metrics_from, tests_from, validate_metadata, validate_metrics, validate_tests};
use crate::models::{
    get, parse_test_name, Build, Count, Environment, Group, Link, MetricThreshold,
    Objects, Project, Squad, SquadObject, Suite, Test, TestRun,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const LATEST: &str = "latest";
pub const LATEST_FINISHED: &str = "latest-finished";

static BUILD_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.+?)(?P<offset>[+-]\d+)$").expect("valid regex"));

/// Split `group/project` into its two slugs
fn split_project_slug(group_project_slug: &str) -> Result<(&str, &str)> {
    match group_project_slug.split_once('/') {
        Some((group, project)) if !group.is_empty() && !project.is_empty() => Ok((group, project)),
        _ => Err(Error::InvalidLookup(format!(
            "\"{}\" is not in the group/project format",
            group_project_slug
        ))),
    }
}

/// Everything that can go along with one submission, as read from input
/// files
#[derive(Debug, Clone, Default)]
pub struct Results {
    pub tests: Option<Value>,
    pub metrics: Option<Value>,
    pub metadata: Option<Value>,
    pub log: Option<String>,
    pub attachments: Vec<PathBuf>,
}

/// Validate `results`, build the object graph in memory and send it in one
/// request
pub fn submit_results(
    api: &SquadApi,
    group_project_slug: &str,
    build_version: &str,
    env_slug: &str,
    results: &Results,
) -> Result<bool> {
    let tests = results.tests.as_ref().map(validate_tests).transpose()?;
    let metrics = results.metrics.as_ref().map(validate_metrics).transpose()?;
    let metadata = results.metadata.as_ref().map(validate_metadata).transpose()?;

    let (group_slug, project_slug) = split_project_slug(group_project_slug)?;

    let project = Project::with_slug(project_slug).in_group(Group::with_slug(group_slug));
    let build = Build::with_version(build_version).of_project(project);
    let mut testrun = TestRun::for_submission(build, Environment::with_slug(env_slug));
    testrun.log = results.log.clone();
    testrun.attachments = results.attachments.clone();

    for test in tests.map(tests_from).unwrap_or_default() {
        testrun.add_test(test);
    }
    for metric in metrics.map(metrics_from).unwrap_or_default() {
        testrun.add_metric(metric);
    }
    if let Some(metadata) = metadata {
        testrun.set_metadata(metadata.clone());
    }

    testrun.submit_results(api)
}

pub fn submit_job(
    api: &SquadApi,
    group_project_slug: &str,
    build_version: &str,
    env_slug: &str,
    backend_name: &str,
    definition: &str,
) -> Result<bool> {
    let (group, project) = split_project_slug(group_project_slug)?;
    Squad::new(api.clone()).submitjob(group, project, build_version, env_slug, backend_name, definition)
}

#[allow(clippy::too_many_arguments)]
pub fn watchjob(
    api: &SquadApi,
    group_project_slug: &str,
    build_version: &str,
    env_slug: &str,
    backend_name: &str,
    testjob_id: &str,
    delay_fetch: bool,
) -> Result<bool> {
    let (group, project) = split_project_slug(group_project_slug)?;
    Squad::new(api.clone()).watchjob(
        group,
        project,
        build_version,
        env_slug,
        backend_name,
        testjob_id,
        delay_fetch,
    )
}

/// Find a build of `project` by version, by alias (`latest`,
/// `latest-finished`) or relative to another one (`v1.2+1`, `latest-3`)
pub fn get_build(api: &SquadApi, token: &str, project: &Project) -> Result<Option<Build>> {
    let newest = Filters::new().with("ordering", "-id");
    match token {
        LATEST => Ok(project.builds(api, &newest, Count::Limit(1))?.into_first()),
        LATEST_FINISHED => {
            let filters = newest.with("status__finished", true);
            Ok(project.builds(api, &filters, Count::Limit(1))?.into_first())
        }
        version => {
            if let Some(build) = project.build(api, version)? {
                return Ok(Some(build));
            }

            let captures = match BUILD_OFFSET.captures(version) {
                Some(captures) => captures,
                None => return Ok(None),
            };
            let offset: i64 = captures["offset"]
                .parse()
                .map_err(|e| Error::Parse(format!("Invalid build offset in \"{}\": {}", version, e)))?;

            let base = match get_build(api, &captures["base"], project)? {
                Some(base) => base,
                None => return Ok(None),
            };
            if offset == 0 {
                return Ok(Some(base));
            }
            let base_id = base
                .id
                .ok_or_else(|| Error::ObjectState("Build has no id".to_string()))?;

            let (lookup, ordering) = if offset > 0 {
                ("id__gt", "id")
            } else {
                ("id__lt", "-id")
            };
            let filters = Filters::new()
                .with(lookup, base_id)
                .with("ordering", ordering)
                .with("offset", offset.unsigned_abs() - 1);
            debug!("Looking up build {} builds away from {}", offset, base_id);
            Ok(project.builds(api, &filters, Count::Limit(1))?.into_first())
        }
    }
}

/// Settings applied by [`create_or_update_project`]. Unset values leave the
/// project untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    pub name: Option<String>,
    pub description: Option<String>,
    /// YAML or JSON text
    pub settings: Option<String>,
    pub is_public: Option<bool>,
    pub html_mail: Option<bool>,
    pub moderate_notifications: Option<bool>,
    pub is_archived: Option<bool>,
    pub email_template: Option<String>,
    pub plugins: Option<Vec<String>>,
    pub important_metadata_keys: Option<Vec<String>>,
    pub wait_before_notification_timeout: Option<u64>,
    pub notification_timeout: Option<u64>,
    /// Zero or negative disables retention
    pub data_retention: Option<i64>,
    /// Fail instead of updating an existing project
    pub no_overwrite: bool,
    /// Metric threshold names
    pub thresholds: Vec<String>,
}

/// Result of [`create_or_update_project`]: the saved project, if it could be
/// saved, the thresholds saved along with it, and everything that went wrong
#[derive(Debug, Default)]
pub struct ProjectUpdate {
    pub project: Option<Project>,
    pub thresholds: Vec<MetricThreshold>,
    pub errors: Vec<String>,
}

impl ProjectUpdate {
    fn failed(error: String) -> Self {
        ProjectUpdate {
            errors: vec![error],
            ..Default::default()
        }
    }
}

pub fn create_or_update_project(
    api: &SquadApi,
    group_slug: &str,
    slug: &str,
    options: &ProjectOptions,
) -> Result<ProjectUpdate> {
    let squad = Squad::new(api.clone());

    let group = match squad.group(group_slug)? {
        Some(group) => group,
        None => return Ok(ProjectUpdate::failed(format!("Group \"{}\" not found", group_slug))),
    };

    let mut project = match group.project(api, slug)? {
        Some(_) if options.no_overwrite => {
            return Ok(ProjectUpdate::failed(format!(
                "Project exists already: {}/{}",
                group_slug, slug
            )))
        }
        Some(project) => project,
        None => Project {
            slug: Some(slug.to_string()),
            group: Some(Link::from_object(group)),
            ..Default::default()
        },
    };

    if let Some(settings) = &options.settings {
        if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(settings) {
            return Ok(ProjectUpdate::failed(format!(
                "Settings is not a valid yaml/json: {}",
                e
            )));
        }
        project.project_settings = Some(settings.clone());
    }

    if let Some(name) = &options.email_template {
        let filters = Filters::new().with("name", name);
        match squad.emailtemplates(&filters, Count::Limit(1))?.into_first() {
            Some(template) => project.custom_email_template = template.url().map(str::to_string),
            None => {
                return Ok(ProjectUpdate::failed(format!(
                    "No email template named \"{}\"",
                    name
                )))
            }
        }
    }

    if options.name.is_some() {
        project.name = options.name.clone();
    }
    if options.description.is_some() {
        project.description = options.description.clone();
    }
    if options.is_public.is_some() {
        project.is_public = options.is_public;
    }
    if options.html_mail.is_some() {
        project.html_mail = options.html_mail;
    }
    if options.moderate_notifications.is_some() {
        project.moderate_notifications = options.moderate_notifications;
    }
    if options.is_archived.is_some() {
        project.is_archived = options.is_archived;
    }
    if options.plugins.is_some() {
        project.enabled_plugins_list = options.plugins.clone();
    }
    if let Some(keys) = &options.important_metadata_keys {
        project.important_metadata_keys = Some(keys.join("\n"));
    }
    if options.wait_before_notification_timeout.is_some() {
        project.wait_before_notification = options.wait_before_notification_timeout;
    }
    if options.notification_timeout.is_some() {
        project.notification_timeout = options.notification_timeout;
    }
    if let Some(days) = options.data_retention {
        project.data_retention_days = Some(u32::try_from(days.max(0)).unwrap_or(u32::MAX));
    }

    if let Err(e) = project.save(api) {
        return Ok(ProjectUpdate::failed(e.to_string()));
    }

    let mut update = ProjectUpdate::default();
    for name in &options.thresholds {
        let existing = project
            .thresholds(api, &Filters::new().with("name", name), Count::Limit(1))?
            .into_first();
        let mut threshold = existing.unwrap_or_else(|| MetricThreshold {
            name: Some(name.clone()),
            project: Some(Link::from_object(project.clone())),
            ..Default::default()
        });

        match threshold.save(api) {
            Ok(()) => update.thresholds.push(threshold),
            Err(e) => update.errors.push(e.to_string()),
        }
    }

    update.project = Some(project);
    Ok(update)
}

/// Ask the server to call `url` once the build finishes. Returns whether
/// the callback was registered and the errors found on the way.
pub fn register_callback(
    api: &SquadApi,
    group_slug: &str,
    project_slug: &str,
    build_version: &str,
    url: &str,
    record_response: bool,
) -> Result<(bool, Vec<String>)> {
    let squad = Squad::new(api.clone());

    let group = match squad.group(group_slug)? {
        Some(group) => group,
        None => return Ok((false, vec![format!("Group \"{}\" not found", group_slug)])),
    };
    let project = match group.project(api, project_slug)? {
        Some(project) => project,
        None => {
            return Ok((
                false,
                vec![format!("Project \"{}/{}\" not found", group_slug, project_slug)],
            ))
        }
    };
    let build = match project.build(api, build_version)? {
        Some(build) => build,
        None => {
            return Ok((
                false,
                vec![format!(
                    "Build \"{}/{}/{}\" not found",
                    group_slug, project_slug, build_version
                )],
            ))
        }
    };
    let build_id = build
        .id
        .ok_or_else(|| Error::ObjectState("Build has no id".to_string()))?;

    let mut fields = vec![("callback_url".to_string(), url.to_string())];
    if record_response {
        fields.push(("callback_record_response".to_string(), "true".to_string()));
    }

    let endpoint = format!("{}{}/callbacks/", Build::ENDPOINT, build_id);
    let response = api.post_form(&endpoint, fields)?;
    if response.is_success() {
        info!("Callback registered to {}", url);
        Ok((true, Vec::new()))
    } else {
        Ok((false, vec![response.text()]))
    }
}

/// Default output file of [`download_tests`]
pub fn results_filename(project: &Project, build: &Build) -> PathBuf {
    let project = project
        .full_name
        .as_deref()
        .or(project.slug.as_deref())
        .unwrap_or_default()
        .replace('/', "-");
    PathBuf::from(format!(
        "{}-{}.txt",
        project,
        build.version.as_deref().unwrap_or_default()
    ))
}

/// Write one `<environment>/<test> <status>` line per test of `build`
pub fn download_tests(
    api: &SquadApi,
    project: &Project,
    build: &Build,
    environment: Option<&Environment>,
    suite: Option<&Suite>,
    output: Option<&Path>,
) -> Result<PathBuf> {
    let build_id = build
        .id
        .ok_or_else(|| Error::ObjectState("Build has no id".to_string()))?;

    let mut filters = Filters::new().with("build", build_id);
    if let Some(id) = environment.and_then(|e| e.id) {
        filters.insert("environment", id);
    }
    if let Some(id) = suite.and_then(|s| s.id) {
        filters.insert("suite", id);
    }

    let slugs: HashMap<u64, String> = project
        .environments(api, &Filters::new(), Count::All)?
        .into_iter()
        .filter_map(|e| Some((e.id?, e.slug?)))
        .collect();

    let tests: Objects<Test> = Squad::new(api.clone()).tests(&filters, Count::All)?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| results_filename(project, build));
    let mut file = fs::File::create(&path)?;

    for test in &tests {
        let env = match test.environment.as_ref() {
            Some(link) => match link.id().and_then(|id| slugs.get(&id)) {
                Some(slug) => slug.clone(),
                None => link.resolve(api)?.slug.clone().unwrap_or_default(),
            },
            None => String::new(),
        };
        writeln!(
            file,
            "{}/{} {}",
            env,
            test.name.as_deref().unwrap_or_default(),
            test.status.as_deref().unwrap_or_default()
        )?;
    }

    info!("{} tests written to {}", tests.len(), path.display());
    Ok(path)
}

/// File attached to a test run, as listed by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub filename: String,
    pub mimetype: Option<String>,
    pub length: Option<u64>,
}

/// Save the attachments of a test run into `output_dir`, all of them or
/// only `filenames`
pub fn download_attachments(
    api: &SquadApi,
    testrun_id: u64,
    filenames: &[String],
    output_dir: &Path,
) -> Result<bool> {
    if get::<TestRun>(api, testrun_id)?.is_none() {
        error!("TestRun {} not found", testrun_id);
        return Ok(false);
    }

    let endpoint = format!("{}{}/attachments/", TestRun::ENDPOINT, testrun_id);
    let available: Vec<Attachment> = api.get(&endpoint, &Filters::new())?.error_for_status()?.json()?;

    let wanted: Vec<&str> = if filenames.is_empty() {
        available.iter().map(|a| a.filename.as_str()).collect()
    } else {
        let missing: Vec<&String> = filenames
            .iter()
            .filter(|name| !available.iter().any(|a| &a.filename == *name))
            .collect();
        if !missing.is_empty() {
            for name in missing {
                error!("File \"{}\" is not attached to TestRun {}", name, testrun_id);
            }
            return Ok(false);
        }
        filenames.iter().map(String::as_str).collect()
    };

    fs::create_dir_all(output_dir)?;
    for filename in wanted {
        let params = Filters::new().with("filename", filename);
        let response = api.get(&endpoint, &params)?.error_for_status()?;
        let basename = Path::new(filename)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(filename));
        let path = output_dir.join(basename);
        fs::write(&path, &response.body)?;
        info!("Downloaded {}", path.display());
    }
    Ok(true)
}

pub fn retrieve_latest_builds(
    api: &SquadApi,
    project_full_name: &str,
    count: Count,
) -> Result<Objects<Build>> {
    let filters = Filters::new().with("project__full_name", project_full_name);
    Squad::new(api.clone()).builds(&filters, count)
}

/// Results of one environment, bucketed by suite
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentResults {
    /// suite → test short name → status
    pub tests: BTreeMap<String, BTreeMap<String, String>>,
    /// suite → metric name → result
    pub metrics: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Results of the build behind `build_url`, keyed by environment slug, or
/// `None` when there is no such build
pub fn retrieve_build_results(
    api: &SquadApi,
    build_url: &str,
) -> Result<Option<BTreeMap<String, EnvironmentResults>>> {
    let (group, project, version) = split_build_url(build_url)?;
    let filters = Filters::new()
        .with("project__full_name", format!("{}/{}", group, project))
        .with("version", version);

    let build = match Squad::new(api.clone()).builds(&filters, Count::Limit(1))?.into_first() {
        Some(build) => build,
        None => return Ok(None),
    };

    let mut results = BTreeMap::new();
    for testrun in build.testruns(api, &Filters::new(), Count::All, true)? {
        let mut env_results = EnvironmentResults::default();

        for suite in &testrun.test_suites {
            let tests = suite
                .items
                .iter()
                .map(|test| {
                    let name = test.name.as_deref().unwrap_or_default();
                    let short_name = test
                        .short_name
                        .clone()
                        .unwrap_or_else(|| parse_test_name(name).1.to_string());
                    (short_name, test.status.clone().unwrap_or_default())
                })
                .collect();
            env_results.tests.insert(suite.name.clone(), tests);
        }

        for suite in &testrun.metric_suites {
            let metrics = suite
                .items
                .iter()
                .map(|metric| {
                    (
                        metric.name.clone().unwrap_or_default(),
                        metric.result.unwrap_or_default(),
                    )
                })
                .collect();
            env_results.metrics.insert(suite.name.clone(), metrics);
        }

        let environment = match testrun.environment.as_ref() {
            Some(link) => link.resolve(api)?.slug.clone().unwrap_or_default(),
            None => String::new(),
        };
        results.insert(environment, env_results);
    }

    Ok(Some(results))
}

/// Split a build URL such as `https://host/group/project/build/version/`
/// or `group/project/build/version` into group, project and version
pub fn split_build_url(build_url: &str) -> Result<(String, String, String)> {
    let path = match build_url.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or_default(),
        None => build_url,
    };
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

    match parts.as_slice() {
        [.., group, project, "build", version] => {
            Ok((group.to_string(), project.to_string(), version.to_string()))
        }
        _ => Err(Error::MalformedUrl(build_url.to_string())),
    }
}
