//! Result submission payloads
//!
//! Input maps are validated before anything touches the network:
//!
//! - tests: name to status string, or to `{"result": ..., "log": ...}`
//! - metrics: name to number, or to a list of numbers
//! - metadata: key to string, object, integer or list

use super::{Metric, Test};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Everything sent to `/api/submit/<group>/<project>/<build>/<environment>`
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub group: String,
    pub project: String,
    pub build: String,
    pub environment: String,
    pub tests: Vec<Test>,
    pub metrics: Vec<Metric>,
    pub metadata: Option<Map<String, Value>>,
    pub log: Option<String>,
    pub attachments: Vec<PathBuf>,
}

impl SubmitRequest {
    pub fn new(group: &str, project: &str, build: &str, environment: &str) -> Self {
        SubmitRequest {
            group: group.to_string(),
            project: project.to_string(),
            build: build.to_string(),
            environment: environment.to_string(),
            ..Default::default()
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "/api/submit/{}/{}/{}/{}",
            self.group, self.project, self.build, self.environment
        )
    }

    /// `tests` form field: name to status, or to `{log, result}` when a log
    /// is attached
    pub fn tests_payload(&self) -> Option<String> {
        if self.tests.is_empty() {
            return None;
        }
        let mut payload = Map::new();
        for test in &self.tests {
            let name = test.name.clone().unwrap_or_default();
            let status = Value::from(test.status.clone().unwrap_or_default());
            let value = match test.log.as_deref() {
                Some(log) if !log.is_empty() => {
                    let mut entry = Map::new();
                    entry.insert("log".to_string(), Value::from(log));
                    entry.insert("result".to_string(), status);
                    Value::Object(entry)
                }
                _ => status,
            };
            payload.insert(name, value);
        }
        Some(Value::Object(payload).to_string())
    }

    /// `metrics` form field: name to value or list of values
    pub fn metrics_payload(&self) -> Option<String> {
        if self.metrics.is_empty() {
            return None;
        }
        let payload: Map<String, Value> = self
            .metrics
            .iter()
            .map(|m| (m.name.clone().unwrap_or_default(), m.submission_value()))
            .collect();
        Some(Value::Object(payload).to_string())
    }

    /// Form fields in the order the server reads them
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        if let Some(tests) = self.tests_payload() {
            fields.push(("tests".to_string(), tests));
        }
        if let Some(metrics) = self.metrics_payload() {
            fields.push(("metrics".to_string(), metrics));
        }
        if let Some(metadata) = self.metadata.as_ref().filter(|m| !m.is_empty()) {
            fields.push(("metadata".to_string(), Value::Object(metadata.clone()).to_string()));
        }
        if let Some(log) = self.log.as_ref().filter(|l| !l.is_empty()) {
            fields.push(("log".to_string(), log.clone()));
        }
        fields
    }
}

fn as_mapping<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::Validation(format!("Incompatible {} detected", what)))
}

pub fn validate_tests(value: &Value) -> Result<&Map<String, Value>> {
    let tests = as_mapping(value, "results")?;
    for value in tests.values() {
        if !(value.is_string() || value.is_object()) {
            return Err(Error::Validation("Incompatible results detected".to_string()));
        }
    }
    Ok(tests)
}

pub fn validate_metrics(value: &Value) -> Result<&Map<String, Value>> {
    let metrics = as_mapping(value, "metrics")?;
    for value in metrics.values() {
        let valid = match value {
            Value::Number(_) => true,
            Value::Array(items) => items.iter().all(Value::is_number),
            _ => false,
        };
        if !valid {
            return Err(Error::Validation("Incompatible metrics detected".to_string()));
        }
    }
    Ok(metrics)
}

pub fn validate_metadata(value: &Value) -> Result<&Map<String, Value>> {
    let metadata = as_mapping(value, "metadata")?;
    for value in metadata.values() {
        let valid = match value {
            Value::String(_) | Value::Object(_) | Value::Array(_) => true,
            Value::Number(n) => n.is_i64() || n.is_u64(),
            _ => false,
        };
        if !valid {
            return Err(Error::Validation("Incompatible metadata detected".to_string()));
        }
    }
    Ok(metadata)
}

/// Build client-side tests from a validated map
pub fn tests_from(tests: &Map<String, Value>) -> Vec<Test> {
    tests
        .iter()
        .map(|(name, value)| match value {
            Value::Object(entry) => {
                let status = entry
                    .get("result")
                    .or_else(|| entry.get("status"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let mut test = Test::new(name.as_str(), status);
                if let Some(log) = entry.get("log").and_then(Value::as_str) {
                    test = test.with_log(log);
                }
                test
            }
            other => Test::new(name.as_str(), other.as_str().unwrap_or_default()),
        })
        .collect()
}

/// Build client-side metrics from a validated map
pub fn metrics_from(metrics: &Map<String, Value>) -> Vec<Metric> {
    metrics
        .iter()
        .map(|(name, value)| Metric::from_value(name.as_str(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_tests() {
        assert!(validate_tests(&json!({"a/b": "pass", "a/c": {"result": "fail"}})).is_ok());

        let err = validate_tests(&json!({"a/b": 1})).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Incompatible results detected");

        assert!(validate_tests(&json!(["a/b"])).is_err());
    }

    #[test]
    fn test_validate_metrics() {
        assert!(validate_metrics(&json!({"m": 1, "n": 2.5, "o": [1, 2]})).is_ok());

        let err = validate_metrics(&json!({"m": "fast"})).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Incompatible metrics detected");
        assert!(validate_metrics(&json!({"m": ["a"]})).is_err());
    }

    #[test]
    fn test_validate_metadata() {
        assert!(validate_metadata(&json!({"a": "x", "b": {}, "c": 1, "d": []})).is_ok());
        assert!(validate_metadata(&json!({"a": 1.5})).is_err());
        assert!(validate_metadata(&json!({"a": true})).is_err());
        assert!(validate_metadata(&json!({"a": null})).is_err());
    }

    #[test]
    fn test_tests_from_map() {
        let map = json!({"s/t1": "pass", "s/t2": {"result": "fail", "log": "boom"}});
        let tests = tests_from(map.as_object().unwrap());
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].status.as_deref(), Some("pass"));
        assert_eq!(tests[1].status.as_deref(), Some("fail"));
        assert_eq!(tests[1].log.as_deref(), Some("boom"));
    }

    #[test]
    fn test_form_fields() {
        let mut request = SubmitRequest::new("g", "p", "b", "e");
        request.tests = vec![
            Test::new("s/t1", "pass"),
            Test::new("s/t2", "fail").with_log("boom"),
        ];
        request.metrics = metrics_from(json!({"s/m1": 42, "s/m2": [1, 2]}).as_object().unwrap());
        request.log = Some("log text".to_string());

        assert_eq!(request.endpoint(), "/api/submit/g/p/b/e");

        let fields = request.form_fields();
        let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["tests", "metrics", "log"]);

        let tests: Value = serde_json::from_str(&fields[0].1).unwrap();
        assert_eq!(
            tests,
            json!({"s/t1": "pass", "s/t2": {"log": "boom", "result": "fail"}})
        );
        assert_eq!(fields[1].1, r#"{"s/m1":42,"s/m2":[1,2]}"#);
        let metrics: Value = serde_json::from_str(&fields[1].1).unwrap();
        assert_eq!(metrics, json!({"s/m1": 42, "s/m2": [1, 2]}));
    }

    #[test]
    fn test_metric_values_are_sent_unchanged() {
        let map = json!({"suite/big": 9007199254740993u64, "suite/metric1": 42, "suite/time": 1.5});
        let mut request = SubmitRequest::new("g", "p", "b", "e");
        request.metrics = metrics_from(map.as_object().unwrap());

        assert_eq!(
            request.metrics_payload().unwrap(),
            r#"{"suite/big":9007199254740993,"suite/metric1":42,"suite/time":1.5}"#
        );
        assert_eq!(request.metrics[1].result, Some(42.0));
    }

    #[test]
    fn test_empty_request_has_no_fields() {
        let request = SubmitRequest::new("g", "p", "b", "e");
        assert!(request.form_fields().is_empty());
    }
}
