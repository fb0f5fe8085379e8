//! TuxBuild and TuxSuite result files
//!
//! TuxBuild results are turned into regular submissions: one test and two
//! metrics per build. TuxSuite results are handed over to the server, which
//! fetches them itself once a watch job is registered for every result.

use crate::error::{Error, Result};
use crate::input::check_file;
use crate::shortcuts::{self, Results};
use crate::api::SquadApi;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Build metadata keys forwarded to the server
pub const ALLOWED_METADATA: &[&str] = &[
    "config",
    "download_url",
    "duration",
    "git_describe",
    "git_ref",
    "git_repo",
    "git_sha",
    "git_short_log",
    "kconfig",
    "kernel_version",
    "toolchain",
];

/// CI variable used when a build has no `git_ref`
pub const KERNEL_BRANCH_ENV: &str = "KERNEL_BRANCH";

/// One entry of a TuxBuild `build.json`
#[derive(Debug, Clone, Deserialize)]
pub struct TuxBuild {
    pub build_status: String,
    pub git_describe: String,
    pub kconfig: Vec<String>,
    pub target_arch: String,
    pub toolchain: String,
    pub download_url: String,
    pub duration: Value,
    pub git_repo: String,
    pub git_sha: String,
    pub git_short_log: String,
    pub kernel_version: String,
    #[serde(default)]
    pub build_name: Option<String>,
    #[serde(default)]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub warnings_count: Option<u64>,
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidBuildJson(message.into())
}

/// ASCII-only JSON rendering of a string list with `", "` separators. Kconfig
/// fragment digests are computed over this exact text, so it must not
/// change.
fn ascii_json_list(items: &[String]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('"');
        for c in item.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 || !c.is_ascii() => {
                    let mut units = [0u16; 2];
                    for unit in c.encode_utf16(&mut units) {
                        let _ = write!(out, "\\u{:04x}", unit);
                    }
                }
                c => out.push(c),
            }
        }
        out.push('"');
    }
    out.push(']');
    out
}

impl TuxBuild {
    fn validate(&self) -> Result<()> {
        if self.build_status != "pass" && self.build_status != "fail" {
            return Err(invalid(format!(
                "build_status must be \"pass\" or \"fail\", got \"{}\"",
                self.build_status
            )));
        }
        if self.kconfig.is_empty() {
            return Err(invalid("kconfig must not be empty"));
        }
        let unique: HashSet<&String> = self.kconfig.iter().collect();
        if unique.len() != self.kconfig.len() {
            return Err(invalid("kconfig entries must be unique"));
        }
        Ok(())
    }

    /// `build/<build_name>`, or `build/<toolchain>-<kconfig>` with a short
    /// hash of the extra config fragments
    pub fn test_name(&self) -> String {
        if let Some(name) = &self.build_name {
            return format!("build/{}", name);
        }

        let Some((first, extra)) = self.kconfig.split_first() else {
            return format!("build/{}", self.toolchain);
        };
        let kconfig = if extra.is_empty() {
            first.clone()
        } else {
            let digest = Sha1::digest(ascii_json_list(extra).as_bytes());
            let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{}-{}", first, &hex[..8])
        };
        format!("build/{}-{}", self.toolchain, kconfig)
    }

    pub fn tests(&self) -> Value {
        let mut tests = Map::new();
        tests.insert(self.test_name(), json!(self.build_status));
        Value::Object(tests)
    }

    /// `<name>-warnings` and `<name>-duration`
    pub fn metrics(&self) -> Value {
        let name = self.test_name();
        let mut metrics = Map::new();
        if let Some(warnings) = self.warnings_count {
            metrics.insert(format!("{}-warnings", name), json!(warnings));
        }
        if self.duration.is_number() {
            metrics.insert(format!("{}-duration", name), self.duration.clone());
        }
        Value::Object(metrics)
    }

    /// Metadata restricted to [`ALLOWED_METADATA`]
    pub fn metadata(&self) -> Value {
        let git_ref = self
            .git_ref
            .clone()
            .or_else(|| std::env::var(KERNEL_BRANCH_ENV).ok());

        // integer-only metadata numbers
        let duration = match &self.duration {
            Value::Number(n) if !(n.is_i64() || n.is_u64()) => Value::String(n.to_string()),
            other => other.clone(),
        };

        let config = Url::parse(&self.download_url)
            .and_then(|url| url.join("config"))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}config", self.download_url));

        let mut metadata = Map::new();
        metadata.insert("config".to_string(), json!(config));
        metadata.insert("download_url".to_string(), json!(self.download_url));
        if !duration.is_null() {
            metadata.insert("duration".to_string(), duration);
        }
        metadata.insert("git_describe".to_string(), json!(self.git_describe));
        if let Some(git_ref) = git_ref {
            metadata.insert("git_ref".to_string(), json!(git_ref));
        }
        metadata.insert("git_repo".to_string(), json!(self.git_repo));
        metadata.insert("git_sha".to_string(), json!(self.git_sha));
        metadata.insert("git_short_log".to_string(), json!(self.git_short_log));
        metadata.insert("kconfig".to_string(), json!(self.kconfig));
        metadata.insert("kernel_version".to_string(), json!(self.kernel_version));
        metadata.insert("toolchain".to_string(), json!(self.toolchain));
        Value::Object(metadata)
    }
}

/// Load and validate a TuxBuild `build.json`
pub fn load_builds(path: &Path) -> Result<Vec<TuxBuild>> {
    check_file(path)?;
    let content = fs::read_to_string(path)?;

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| invalid(format!("Failed to load json: {}", e)))?;
    let entries = match value {
        Value::Array(entries) if !entries.is_empty() => entries,
        Value::Array(_) => return Err(invalid("no builds found")),
        _ => return Err(invalid("expected a list of builds")),
    };

    entries
        .into_iter()
        .map(|entry| {
            let build: TuxBuild = serde_json::from_value(entry).map_err(|e| invalid(e.to_string()))?;
            build.validate()?;
            Ok(build)
        })
        .collect()
}

/// Submit every build as its own test run: version `git_describe`,
/// environment `target_arch`
pub fn submit_tuxbuild(api: &SquadApi, group_project_slug: &str, builds: &[TuxBuild]) -> Result<bool> {
    let mut ok = true;
    for build in builds {
        let results = Results {
            tests: Some(build.tests()),
            metrics: Some(build.metrics()),
            metadata: Some(build.metadata()),
            ..Default::default()
        };
        ok &= shortcuts::submit_results(
            api,
            group_project_slug,
            &build.git_describe,
            &build.target_arch,
            &results,
        )?;
    }
    Ok(ok)
}

/// Kind of TuxSuite result, as encoded in job ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Build,
    OeBuild,
    Test,
}

impl ResultKind {
    fn of(result: &Value, is_test: bool) -> Self {
        if is_test {
            ResultKind::Test
        } else if result.get("sources").is_some() {
            ResultKind::OeBuild
        } else {
            ResultKind::Build
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            ResultKind::Build => "BUILD",
            ResultKind::OeBuild => "OEBUILD",
            ResultKind::Test => "TEST",
        }
    }
}

/// Builds and tests of a TuxSuite results file, indexed by uid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TuxSuiteResults {
    pub builds: Map<String, Value>,
    pub tests: Map<String, Value>,
}

fn index_by_uid(results: Vec<Value>) -> Result<Map<String, Value>> {
    results
        .into_iter()
        .map(|result| {
            let uid = result
                .get("uid")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Parse("TuxSuite result without \"uid\"".to_string()))?
                .to_string();
            Ok((uid, result))
        })
        .collect()
}

/// Load a TuxSuite build list, test list, single result or plan
/// (`{"builds": {...}, "tests": {...}}`)
pub fn load_results_file(path: &Path) -> Result<TuxSuiteResults> {
    check_file(path)?;
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Parse(format!("Failed to load json: {}", e)))?;

    let results = match value {
        Value::Object(mut plan) if plan.contains_key("builds") && plan.contains_key("tests") => {
            let mut section = |key: &str| match plan.remove(key) {
                Some(Value::Object(map)) => Ok(map),
                Some(Value::Array(list)) => index_by_uid(list),
                Some(Value::Null) | None => Ok(Map::new()),
                Some(other) => Err(Error::Parse(format!("Unexpected \"{}\" in plan: {}", key, other))),
            };
            return Ok(TuxSuiteResults {
                builds: section("builds")?,
                tests: section("tests")?,
            });
        }
        single @ Value::Object(_) => vec![single],
        Value::Array(list) => list,
        other => return Err(Error::Parse(format!("Unexpected TuxSuite results: {}", other))),
    };

    let is_build = results
        .first()
        .map(|r| r.get("build_name").map_or(false, |n| !n.is_null()))
        .unwrap_or(false);
    let indexed = index_by_uid(results)?;

    Ok(if is_build {
        TuxSuiteResults {
            builds: indexed,
            tests: Map::new(),
        }
    } else {
        TuxSuiteResults {
            builds: Map::new(),
            tests: indexed,
        }
    })
}

fn str_field<'a>(result: &'a Value, key: &str) -> Result<&'a str> {
    result
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Parse(format!("TuxSuite result without \"{}\"", key)))
}

/// `<KIND>:<project with / as @>#<uid>`, e.g. `TEST:linaro@lkft#1yPY...`
pub fn job_id(kind: ResultKind, result: &Value) -> Result<String> {
    let project = str_field(result, "project")?.replace('/', "@");
    let uid = str_field(result, "uid")?;
    Ok(format!("{}:{}#{}", kind.prefix(), project, uid))
}

/// Environment of a result: the device of a test, the architecture of a
/// build
pub fn environment(kind: ResultKind, result: &Value) -> Result<&str> {
    match kind {
        ResultKind::Test => str_field(result, "device"),
        ResultKind::Build => str_field(result, "target_arch"),
        ResultKind::OeBuild => str_field(result, "target_arch").or_else(|_| str_field(result, "machine")),
    }
}

/// `git-describe` from `<download_url>/status.json`
pub fn fetch_build_version(download_url: &str) -> Result<String> {
    let url = format!("{}/status.json", download_url.trim_end_matches('/'));
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let status: Value = client.get(&url).send()?.error_for_status()?.json()?;
    status
        .get("git-describe")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Parse(format!("No \"git-describe\" in {}", url)))
}

impl TuxSuiteResults {
    /// Version of the first build, read from its status file
    pub fn build_version(&self) -> Result<String> {
        let first = self
            .builds
            .values()
            .next()
            .ok_or_else(|| Error::InvalidLookup("No TuxSuite build to take the version from".to_string()))?;
        fetch_build_version(str_field(first, "download_url")?)
    }

    /// Register one watch job per build and test
    pub fn submit(
        &self,
        api: &SquadApi,
        group_project_slug: &str,
        build_version: &str,
        backend: &str,
        delay_fetch: bool,
    ) -> Result<bool> {
        let mut ok = true;
        for (label, results, is_test) in [("builds", &self.builds, false), ("tests", &self.tests, true)] {
            let mut watching = 0;
            for result in results.values() {
                let kind = ResultKind::of(result, is_test);
                let testjob_id = job_id(kind, result)?;
                let accepted = shortcuts::watchjob(
                    api,
                    group_project_slug,
                    build_version,
                    environment(kind, result)?,
                    backend,
                    &testjob_id,
                    delay_fetch,
                )?;
                if !accepted {
                    error!("Failed to watch {}", testjob_id);
                }
                ok &= accepted;
                watching += 1;
            }
            info!("Triggered {} watch jobs for {}", watching, label);
        }
        Ok(ok)
    }
}
