use super::submit::SubmitRequest;
use super::{
    cache_key, fetch, parse_test_name, squad_object, Build, Count, Environment, FilterCache,
    Link, LocalId, Metric, Objects, Squad, SquadObject, Test,
};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

type Metadata = serde_json::Map<String, serde_json::Value>;

/// Results of one environment for one build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRun {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resubmit_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_recorded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Link<Environment>>,

    /// Log text sent along with a submission
    #[serde(skip)]
    pub log: Option<String>,
    /// Files sent along with a submission
    #[serde(skip)]
    pub attachments: Vec<PathBuf>,
    /// Filled by [`TestRun::bucket_suites`]
    #[serde(skip)]
    pub test_suites: Vec<SuiteBucket<Test>>,
    /// Filled by [`TestRun::bucket_suites`]
    #[serde(skip)]
    pub metric_suites: Vec<SuiteBucket<Metric>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
    #[serde(skip)]
    pending_tests: Objects<Test>,
    #[serde(skip)]
    pending_metrics: Objects<Metric>,
    #[serde(skip)]
    tests_cache: FilterCache<Test>,
    #[serde(skip)]
    metrics_cache: FilterCache<Metric>,
    #[serde(skip)]
    metadata_cache: OnceCell<Option<Metadata>>,
    #[serde(skip)]
    summary_cache: OnceCell<Option<TestRunStatus>>,
}

squad_object!(TestRun, "TestRun", "/api/testruns/");

/// Per-suite counters of a test run, from `/api/testruns/<id>/status/`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
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
    pub suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_version: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(@record TestRunStatus, "TestRunStatus");

/// Tests or metrics sharing a suite name
#[derive(Debug, Clone, Serialize)]
pub struct SuiteBucket<T> {
    pub name: String,
    pub items: Vec<T>,
}

fn bucket<T, F>(mut items: Vec<T>, name_of: F) -> Vec<SuiteBucket<T>>
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| name_of(a).cmp(name_of(b)));

    let mut buckets: Vec<SuiteBucket<T>> = Vec::new();
    for item in items {
        let suite = parse_test_name(name_of(&item)).0.to_string();
        match buckets.last_mut() {
            Some(last) if last.name == suite => last.items.push(item),
            _ => buckets.push(SuiteBucket {
                name: suite,
                items: vec![item],
            }),
        }
    }
    buckets
}

fn test_name(test: &Test) -> &str {
    test.name.as_deref().unwrap_or_default()
}

fn metric_name(metric: &Metric) -> &str {
    metric.name.as_deref().unwrap_or_default()
}

impl TestRun {
    /// Client-side run of `build` in `environment`, to be filled with
    /// [`TestRun::add_test`] and [`TestRun::add_metric`] and then submitted
    pub fn for_submission(build: Build, environment: Environment) -> Self {
        TestRun {
            build: Some(Link::from_object(build)),
            environment: Some(Link::from_object(environment)),
            ..Default::default()
        }
    }

    fn server_id(&self) -> Result<u64> {
        self.id
            .ok_or_else(|| Error::ObjectState("TestRun has not been saved".to_string()))
    }

    fn is_local(&self) -> bool {
        self.id.is_none()
    }

    /// Queue a test for submission
    pub fn add_test(&mut self, test: Test) {
        self.pending_tests.insert(test);
    }

    /// Queue a metric for submission
    pub fn add_metric(&mut self, metric: Metric) {
        self.pending_metrics.insert(metric);
    }

    /// Tests of this run: the queued ones for a client-side run, otherwise
    /// fetched from the server and memoized per filter set
    pub fn tests(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Test>> {
        if self.is_local() || !self.pending_tests.is_empty() {
            return Ok(self.pending_tests.clone());
        }
        let filters = filters.clone().with("test_run", self.server_id()?);
        self.tests_cache
            .get_or_try_insert(cache_key(&filters, count), || {
                fetch(api, Test::ENDPOINT, &filters, count)
            })
    }

    /// Metrics of this run, same rules as [`TestRun::tests`]
    pub fn metrics(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Metric>> {
        if self.is_local() || !self.pending_metrics.is_empty() {
            return Ok(self.pending_metrics.clone());
        }
        let filters = filters.clone().with("test_run", self.server_id()?);
        self.metrics_cache
            .get_or_try_insert(cache_key(&filters, count), || {
                fetch(api, Metric::ENDPOINT, &filters, count)
            })
    }

    /// Metadata of this run, read once from `metadata_file`. The server
    /// answers `None` when there is none.
    pub fn metadata(&self, api: &SquadApi) -> Result<Option<&Metadata>> {
        let metadata = self.metadata_cache.get_or_try_init(|| {
            let url = match &self.metadata_file {
                Some(url) => url,
                None => return Ok(None),
            };
            let response = api.get(url, &Filters::new())?.error_for_status()?;
            if response.text().trim() == "None" {
                return Ok(None);
            }
            response.json().map(Some)
        })?;
        Ok(metadata.as_ref())
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata_cache = OnceCell::from(Some(metadata));
    }

    /// Per-suite status entries of this run
    pub fn statuses(
        &self,
        api: &SquadApi,
        filters: &Filters,
        count: Count,
    ) -> Result<Objects<TestRunStatus>> {
        let endpoint = format!("{}{}/status/", Self::ENDPOINT, self.server_id()?);
        fetch(api, &endpoint, filters, count)
    }

    /// Status entry covering the whole run, fetched once
    pub fn summary(&self, api: &SquadApi) -> Result<Option<&TestRunStatus>> {
        let summary = self.summary_cache.get_or_try_init(|| {
            let filters = Filters::new().with("suite__isnull", true);
            Ok::<_, Error>(self.statuses(api, &filters, Count::All)?.into_first())
        })?;
        Ok(summary.as_ref())
    }

    /// Group tests and metrics by suite into `test_suites` and
    /// `metric_suites`
    pub fn bucket_suites(&mut self, api: &SquadApi) -> Result<()> {
        let tests = self.tests(api, &Filters::new(), Count::All)?.into_values();
        self.test_suites = bucket(tests, test_name);

        let metrics = self.metrics(api, &Filters::new(), Count::All)?.into_values();
        self.metric_suites = bucket(metrics, metric_name);
        Ok(())
    }

    /// Forget memoized tests, metrics, metadata and summary
    pub fn clear_cache(&mut self) {
        self.tests_cache.clear();
        self.metrics_cache.clear();
        self.metadata_cache = OnceCell::new();
        self.summary_cache = OnceCell::new();
    }

    /// Submit this run's tests, metrics, metadata, log and attachments in a
    /// single request. Build, project, group and environment are resolved
    /// through their links when needed.
    pub fn submit_results(&self, api: &SquadApi) -> Result<bool> {
        let missing = |what: &str| Error::InvalidLookup(format!("TestRun has no {}", what));

        let build = self.build.as_ref().ok_or_else(|| missing("build"))?.resolve(api)?;
        let project = build
            .project
            .as_ref()
            .ok_or_else(|| missing("project"))?
            .resolve(api)?;
        let group = project
            .group
            .as_ref()
            .ok_or_else(|| missing("group"))?
            .resolve(api)?;
        let environment = self
            .environment
            .as_ref()
            .ok_or_else(|| missing("environment"))?
            .resolve(api)?;

        let request = SubmitRequest {
            group: group.slug.clone().ok_or_else(|| missing("group slug"))?,
            project: project.slug.clone().ok_or_else(|| missing("project slug"))?,
            build: build.version.clone().ok_or_else(|| missing("build version"))?,
            environment: environment
                .slug
                .clone()
                .ok_or_else(|| missing("environment slug"))?,
            tests: self.tests(api, &Filters::new(), Count::All)?.into_values(),
            metrics: self.metrics(api, &Filters::new(), Count::All)?.into_values(),
            metadata: self.metadata(api)?.cloned(),
            log: self.log.clone(),
            attachments: self.attachments.clone(),
        };

        Squad::new(api.clone()).submit(&request)
    }
}
