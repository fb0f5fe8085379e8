use super::{squad_object, Backend, Build, Link, LocalId, Project, Squad, TestRun};
use crate::api::SquadApi;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A job handed to a CI backend on behalf of a build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestJob {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Environment slug
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_attempts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetch_attempt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_resubmit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resubmitted_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Link<Backend>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testrun: Option<Link<TestRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Link<Project>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_build: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_job: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(TestJob, "TestJob", "/api/testjobs/");

fn required<'a, T>(value: Option<&'a T>, what: &str) -> Result<&'a T> {
    value.ok_or_else(|| Error::InvalidLookup(format!("TestJob has no {}", what)))
}

fn slug_of(value: Option<&String>, what: &str) -> Result<String> {
    value
        .cloned()
        .ok_or_else(|| Error::InvalidLookup(format!("{} has no slug", what)))
}

impl TestJob {
    /// Resubmit this job's definition through `/api/submitjob/`
    pub fn submit(&self, api: &SquadApi) -> Result<bool> {
        let project = required(self.target.as_ref(), "target project")?.resolve(api)?;
        let group = required(project.group.as_ref(), "group")?.resolve(api)?;
        let build = required(self.target_build.as_ref(), "target build")?.resolve(api)?;
        let backend = required(self.backend.as_ref(), "backend")?.resolve(api)?;

        Squad::new(api.clone()).submitjob(
            &slug_of(group.slug.as_ref(), "Group")?,
            &slug_of(project.slug.as_ref(), "Project")?,
            required(build.version.as_ref(), "build version")?,
            required(self.environment.as_ref(), "environment")?,
            required(backend.name.as_ref(), "backend name")?,
            required(self.definition.as_ref(), "definition")?,
        )
    }
}
