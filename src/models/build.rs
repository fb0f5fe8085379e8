use super::{
    cache_key, fetch, retrieve_url, squad_object, Count, FilterCache, Link, LocalId, Metric,
    Objects, Project, SquadObject, Test, TestRun,
};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

/// One version of a project, holding test runs from any number of
/// environments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testjobs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Link<Project>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_baseline: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
    #[serde(skip)]
    tests_cache: FilterCache<Test>,
    #[serde(skip)]
    metrics_cache: FilterCache<Metric>,
    #[serde(skip)]
    metadata_cache: OnceCell<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip)]
    status_cache: OnceCell<BuildStatus>,
}

squad_object!(Build, "Build", "/api/builds/");

/// Aggregated results of a build, from `/api/builds/<id>/status/`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_pass: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_fail: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_xfail: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_summary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_metrics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_tests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified_on_timeout: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regressions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_runs_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_runs_completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_runs_incomplete: Option<u64>,
}

impl Build {
    pub fn with_version(version: impl Into<String>) -> Self {
        Build {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Attach the owning project, e.g. when preparing a submission
    pub fn of_project(mut self, project: Project) -> Self {
        self.project = Some(Link::from_object(project));
        self
    }

    fn server_id(&self) -> Result<u64> {
        self.id.ok_or_else(|| {
            Error::ObjectState(format!(
                "Build \"{}\" has not been saved",
                self.version.as_deref().unwrap_or_default()
            ))
        })
    }

    fn sub_endpoint(&self, resource: &str) -> Result<String> {
        Ok(format!("{}{}/{}/", Self::ENDPOINT, self.server_id()?, resource))
    }

    /// Test runs of this build; with `bucket_suites` each run also gets its
    /// tests and metrics grouped by suite
    pub fn testruns(
        &self,
        api: &SquadApi,
        filters: &Filters,
        count: Count,
        bucket_suites: bool,
    ) -> Result<Objects<TestRun>> {
        let filters = filters.clone().with("build", self.server_id()?);
        let mut testruns: Objects<TestRun> = fetch(api, TestRun::ENDPOINT, &filters, count)?;

        if bucket_suites {
            for testrun in testruns.values_mut() {
                testrun.bucket_suites(api)?;
            }
        }

        Ok(testruns)
    }

    /// Memoized per filter set
    pub fn tests(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Test>> {
        let endpoint = self.sub_endpoint("tests")?;
        self.tests_cache
            .get_or_try_insert(cache_key(filters, count), || {
                fetch(api, &endpoint, filters, count)
            })
    }

    /// Memoized per filter set
    pub fn metrics(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Metric>> {
        let endpoint = self.sub_endpoint("metrics")?;
        self.metrics_cache
            .get_or_try_insert(cache_key(filters, count), || {
                fetch(api, &endpoint, filters, count)
            })
    }

    /// Free-form build metadata, fetched once
    pub fn metadata(
        &self,
        api: &SquadApi,
    ) -> Result<&serde_json::Map<String, serde_json::Value>> {
        self.metadata_cache.get_or_try_init(|| {
            let endpoint = self.sub_endpoint("metadata")?;
            retrieve_url(api, &endpoint)
        })
    }

    /// Build status, fetched once
    pub fn status(&self, api: &SquadApi) -> Result<&BuildStatus> {
        self.status_cache.get_or_try_init(|| {
            let endpoint = self.sub_endpoint("status")?;
            retrieve_url(api, &endpoint)
        })
    }

    /// Forget memoized tests, metrics, metadata and status
    pub fn clear_cache(&mut self) {
        self.tests_cache.clear();
        self.metrics_cache.clear();
        self.metadata_cache = OnceCell::new();
        self.status_cache = OnceCell::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn build(id: u64) -> Build {
        Build {
            id: Some(id),
            version: Some("v1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_tests_are_memoized_per_filter() {
        let mut server = Server::new();
        let all = server
            .mock("GET", "/api/builds/1/tests/")
            .match_query(Matcher::Exact("limit=1000".into()))
            .with_body(
                json!({"next": null, "results": [{"id": 1, "name": "s/t1", "status": "pass"}]})
                    .to_string(),
            )
            .expect(1)
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let build = build(1);
        let first = build.tests(&api, &Filters::new(), Count::All).unwrap();
        let second = build.tests(&api, &Filters::new(), Count::All).unwrap();
        all.assert();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);

        let failed = server
            .mock("GET", "/api/builds/1/tests/")
            .match_query(Matcher::UrlEncoded("result".into(), "false".into()))
            .with_body(json!({"next": null, "results": []}).to_string())
            .expect(1)
            .create();
        let filters = Filters::new().with("result", false);
        assert!(build.tests(&api, &filters, Count::All).unwrap().is_empty());
        failed.assert();
    }

    #[test]
    fn test_metadata_and_status_fetched_once() {
        let mut server = Server::new();
        let metadata = server
            .mock("GET", "/api/builds/2/metadata/")
            .with_body(json!({"kernel_version": "6.1"}).to_string())
            .expect(1)
            .create();
        let status = server
            .mock("GET", "/api/builds/2/status/")
            .with_body(json!({"tests_fail": 3, "finished": true, "extra": 1}).to_string())
            .expect(1)
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let build = build(2);
        for _ in 0..2 {
            assert_eq!(build.metadata(&api).unwrap()["kernel_version"], "6.1");
            assert_eq!(build.status(&api).unwrap().tests_fail, Some(3));
        }
        metadata.assert();
        status.assert();
    }

    #[test]
    fn test_clear_cache_refetches() {
        let mut server = Server::new();
        let status = server
            .mock("GET", "/api/builds/3/status/")
            .with_body(json!({"finished": false}).to_string())
            .expect(2)
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let mut build = build(3);
        build.status(&api).unwrap();
        build.clear_cache();
        build.status(&api).unwrap();
        status.assert();
    }

    #[test]
    fn test_unsaved_build() {
        let api = SquadApi::configure("http://localhost:8000", None).unwrap();
        let build = Build::default();
        assert!(matches!(
            build.tests(&api, &Filters::new(), Count::All),
            Err(Error::ObjectState(_))
        ));
    }

    #[test]
    fn test_project_link_is_lazy() {
        let mut server = Server::new();
        let project = server
            .mock("GET", "/api/projects/4/")
            .with_body(json!({"id": 4, "slug": "linux"}).to_string())
            .expect(1)
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let build: Build = serde_json::from_value(json!({
            "id": 1,
            "project": format!("{}/api/projects/4/", server.url()),
        }))
        .unwrap();

        let link = build.project.as_ref().unwrap();
        assert!(link.get().is_none());
        assert_eq!(link.resolve(&api).unwrap().slug.as_deref(), Some("linux"));
        assert_eq!(link.resolve(&api).unwrap().id, Some(4));
        project.assert();
    }
}
