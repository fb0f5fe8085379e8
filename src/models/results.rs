use super::{
    cache_key, fetch, squad_object, Build, Count, Environment, FilterCache, Link, LocalId,
    Objects, Project, SquadObject, TestRun,
};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single test result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Test {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_run: Option<Link<TestRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_known_issues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<Link<Suite>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_issues: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Link<Environment>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Test, "Test", "/api/tests/");

impl Test {
    /// A test result built client-side for submission
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Test {
            name: Some(name.into()),
            status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = Some(log.into());
        self
    }
}

/// A benchmark measurement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_list: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_outlier: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_run: Option<Link<TestRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<Link<Suite>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Link<Environment>>,

    /// Submitted value exactly as the user gave it
    #[serde(skip)]
    submitted: Option<serde_json::Value>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Metric, "Metric", "/api/metrics/");

impl Metric {
    /// A single-value measurement built client-side for submission
    pub fn new(name: impl Into<String>, result: f64) -> Self {
        Metric {
            name: Some(name.into()),
            result: Some(result),
            ..Default::default()
        }
    }

    /// A multi-value measurement built client-side for submission
    pub fn with_measurements(name: impl Into<String>, measurements: Vec<f64>) -> Self {
        Metric {
            name: Some(name.into()),
            measurement_list: Some(measurements),
            ..Default::default()
        }
    }

    /// A measurement read from a results file. `value` is a number or a
    /// list of numbers and is submitted unchanged.
    pub fn from_value(name: impl Into<String>, value: serde_json::Value) -> Self {
        let mut metric = match &value {
            serde_json::Value::Array(items) => {
                Metric::with_measurements(name, items.iter().filter_map(|v| v.as_f64()).collect())
            }
            other => Metric::new(name, other.as_f64().unwrap_or_default()),
        };
        metric.submitted = Some(value);
        metric
    }

    /// Value as accepted by the submit endpoint
    pub fn submission_value(&self) -> serde_json::Value {
        if let Some(value) = &self.submitted {
            return value.clone();
        }
        match (&self.measurement_list, self.result) {
            (Some(list), _) => serde_json::json!(list),
            (None, Some(result)) => serde_json::json!(result),
            (None, None) => serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Suite {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Link<Project>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
    #[serde(skip)]
    tests_cache: FilterCache<Test>,
}

squad_object!(Suite, "Suite", "/api/suites/");

impl Suite {
    /// Tests of this suite, memoized per filter set
    pub fn tests(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Test>> {
        let id = self.id.ok_or_else(|| {
            Error::ObjectState(format!(
                "Suite \"{}\" has not been saved",
                self.slug.as_deref().unwrap_or_default()
            ))
        })?;
        let endpoint = format!("{}{}/tests/", Self::ENDPOINT, id);
        self.tests_cache
            .get_or_try_insert(cache_key(filters, count), || {
                fetch(api, &endpoint, filters, count)
            })
    }

    pub fn clear_cache(&self) {
        self.tests_cache.clear();
    }
}
