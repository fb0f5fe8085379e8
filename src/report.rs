//! Report generation
//!
//! A report is a Jinja template rendered against a context. Each context
//! variable names an entity type and the filters used to fetch it, e.g.
//!
//! ```yaml
//! reports:
//!   - name: latest builds
//!     template: builds.jinja2
//!     output: builds.txt
//!     context:
//!       builds:
//!         type: Build
//!         filters:
//!           project__slug: linux-mainline
//!           ordering: -id
//! ```

use crate::api::{Filters, SquadApi};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::input::read_text_file;
use crate::models::{Count, Squad};
use minijinja::{path_loader, Environment};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// One context variable: what to fetch and how to filter it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
struct ContextVariable {
    name: String,
    type_name: String,
    filters: Filters,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Variables made available to a template
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    variables: Vec<ContextVariable>,
}

impl ReportContext {
    pub fn new(context: BTreeMap<String, ContextSpec>) -> Self {
        let variables = context
            .into_iter()
            .map(|(name, spec)| {
                let name = if is_identifier(&name) {
                    name
                } else {
                    name.replace(' ', "_")
                };
                let filters = spec
                    .filters
                    .iter()
                    .map(|(k, v)| (k.clone(), filter_value(v)))
                    .collect();
                ContextVariable {
                    name,
                    type_name: spec.type_name,
                    filters,
                }
            })
            .collect();
        ReportContext { variables }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Fetch every variable, all matching objects each
    pub fn fill(&self, squad: &Squad) -> Result<BTreeMap<String, Vec<Value>>> {
        debug!("Building report context");
        let mut values = BTreeMap::new();
        for variable in &self.variables {
            let objects = squad.fetch_type(&variable.type_name, &variable.filters, Count::All)?;
            values.insert(variable.name.clone(), objects);
        }
        Ok(values)
    }
}

/// Where a rendered report goes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReportOutput {
    #[default]
    Stdout,
    /// Kept in memory, read back through [`Report::output`]
    Buffer(String),
    /// Created or overwritten
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Report {
    pub name: String,
    /// Path of a `.jinja2` file, or the template text itself
    pub template: String,
    pub output: ReportOutput,
    pub context: Option<ReportContext>,
}

impl Report {
    pub fn new(template: impl Into<String>) -> Self {
        Report {
            name: Uuid::new_v4().to_string(),
            template: template.into(),
            output: ReportOutput::Stdout,
            context: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_output(mut self, output: ReportOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_context(mut self, context: ReportContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Render the template against the filled context
    pub fn generate(&self, squad: &Squad) -> Result<String> {
        info!("Generating report \"{}\"", self.name);
        let values = match &self.context {
            Some(context) => context.fill(squad)?,
            None => BTreeMap::new(),
        };

        if self.template.ends_with(".jinja2") {
            let path = Path::new(&self.template);
            if !path.is_file() {
                return Err(Error::InvalidTemplate(format!(
                    "Template file \"{}\" not found!",
                    self.template
                )));
            }
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .ok_or_else(|| Error::InvalidTemplate(self.template.clone()))?;

            let mut env = Environment::new();
            env.set_loader(path_loader(dir));
            let template = env.get_template(file_name)?;
            Ok(template.render(&values)?)
        } else {
            let env = Environment::new();
            Ok(env.render_str(&self.template, &values)?)
        }
    }

    /// Send `rendered` to this report's sink
    fn write(&mut self, rendered: &str, stdout: &mut dyn Write) -> Result<()> {
        match &mut self.output {
            ReportOutput::Stdout => writeln!(stdout, "{}", rendered)?,
            ReportOutput::Buffer(buffer) => buffer.push_str(rendered),
            ReportOutput::File(path) => fs::write(path.as_path(), rendered).map_err(|e| {
                Error::InvalidReportOutput(format!(
                    "Report \"{}\" cannot be written to \"{}\": {}",
                    self.name,
                    path.display(),
                    e
                ))
            })?,
        }
        Ok(())
    }
}

/// Report entry of a YAML descriptor
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSpec {
    #[serde(default)]
    pub name: Option<String>,
    pub template: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub context: BTreeMap<String, ContextSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct Descriptor {
    #[serde(default)]
    reports: Vec<ReportSpec>,
}

/// Renders a batch of reports against one SQUAD instance
#[derive(Debug)]
pub struct ReportGenerator {
    config: ClientConfig,
    reports: Vec<Report>,
}

impl ReportGenerator {
    pub fn new(squad_url: &str, token: Option<&str>) -> Self {
        Self::from_config(ClientConfig::new(squad_url).with_token(token.map(str::to_string)))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        ReportGenerator {
            config,
            reports: Vec::new(),
        }
    }

    pub fn add_report(&mut self, report: Report) -> &mut Report {
        self.reports.push(report);
        let last = self.reports.len() - 1;
        &mut self.reports[last]
    }

    /// Add the reports listed in a YAML descriptor. Relative template and
    /// output paths are taken relative to the descriptor.
    pub fn load_descriptor(&mut self, path: &Path) -> Result<usize> {
        let descriptor: Descriptor = serde_yaml::from_str(&read_text_file(path)?)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let count = descriptor.reports.len();
        for spec in descriptor.reports {
            let template = if spec.template.ends_with(".jinja2") {
                base.join(&spec.template).to_string_lossy().into_owned()
            } else {
                spec.template
            };
            let mut report = Report::new(template).with_context(ReportContext::new(spec.context));
            if let Some(name) = spec.name {
                report = report.with_name(name);
            }
            if let Some(output) = spec.output {
                report = report.with_output(ReportOutput::File(base.join(output)));
            }
            self.reports.push(report);
        }
        Ok(count)
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Render every report, printing stdout ones to `stdout`
    pub fn generate_to(&mut self, stdout: &mut dyn Write) -> Result<&[Report]> {
        let squad = Squad::new(SquadApi::from_config(self.config.clone())?);
        for report in &mut self.reports {
            let rendered = report.generate(&squad)?;
            report.write(&rendered, stdout)?;
        }
        Ok(&self.reports)
    }

    pub fn generate(&mut self) -> Result<&[Report]> {
        self.generate_to(&mut io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tempfile::TempDir;

    fn builds_context() -> ReportContext {
        let mut context = BTreeMap::new();
        context.insert(
            "my builds".to_string(),
            ContextSpec {
                type_name: "Build".to_string(),
                filters: [("project".to_string(), json!(1))].into_iter().collect(),
            },
        );
        ReportContext::new(context)
    }

    fn mock_builds(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/api/builds/")
            .match_query(Matcher::UrlEncoded("project".into(), "1".into()))
            .with_body(
                json!({"next": null, "results": [{"id": 1, "version": "v1"}, {"id": 2, "version": "v2"}]})
                    .to_string(),
            )
            .create()
    }

    #[test]
    fn test_context_names_are_identifiers() {
        let context = builds_context();
        assert_eq!(context.names().collect::<Vec<_>>(), vec!["my_builds"]);
        assert!(is_identifier("builds_2"));
        assert!(!is_identifier("2builds"));
    }

    #[test]
    fn test_inline_template() {
        let mut server = Server::new();
        mock_builds(&mut server);
        let squad = Squad::new(SquadApi::configure(&server.url(), None).unwrap());

        let report = Report::new("{% for b in my_builds %}{{ b.version }};{% endfor %}")
            .with_context(builds_context());
        assert_eq!(report.generate(&squad).unwrap(), "v1;v2;");
    }

    #[test]
    fn test_template_file() {
        let mut server = Server::new();
        mock_builds(&mut server);
        let squad = Squad::new(SquadApi::configure(&server.url(), None).unwrap());

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("builds.jinja2");
        fs::write(&path, "{{ my_builds | length }} builds").unwrap();

        let report = Report::new(path.to_string_lossy()).with_context(builds_context());
        assert_eq!(report.generate(&squad).unwrap(), "2 builds");
    }

    #[test]
    fn test_missing_template_file() {
        let squad = Squad::new(SquadApi::configure("http://localhost:8000", None).unwrap());
        let report = Report::new("/does/not/exist.jinja2");
        assert!(matches!(report.generate(&squad), Err(Error::InvalidTemplate(_))));
    }

    #[test]
    fn test_unknown_type() {
        let squad = Squad::new(SquadApi::configure("http://localhost:8000", None).unwrap());
        let mut context = BTreeMap::new();
        context.insert(
            "x".to_string(),
            ContextSpec {
                type_name: "Nope".to_string(),
                ..Default::default()
            },
        );
        let report = Report::new("{{ x }}").with_context(ReportContext::new(context));
        assert!(matches!(report.generate(&squad), Err(Error::InvalidObjectType(_))));
    }

    #[test]
    fn test_generator_outputs() {
        let mut server = Server::new();
        mock_builds(&mut server);

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("out.txt");

        let mut generator = ReportGenerator::new(&server.url(), None);
        generator.add_report(
            Report::new("{{ my_builds[0].version }}")
                .with_context(builds_context())
                .with_output(ReportOutput::Buffer(String::new())),
        );
        generator.add_report(Report::new("to file").with_output(ReportOutput::File(file.clone())));
        generator.add_report(Report::new("to stdout"));

        let mut stdout = Vec::new();
        let reports = generator.generate_to(&mut stdout).unwrap();

        assert_eq!(reports[0].output, ReportOutput::Buffer("v1".to_string()));
        assert_eq!(fs::read_to_string(&file).unwrap(), "to file");
        assert_eq!(String::from_utf8(stdout).unwrap(), "to stdout\n");
    }

    #[test]
    fn test_generator_unwritable_output() {
        let server = Server::new();
        let temp = TempDir::new().unwrap();

        let mut generator = ReportGenerator::new(&server.url(), None);
        generator.add_report(
            Report::new("x").with_output(ReportOutput::File(temp.path().join("missing/dir/out.txt"))),
        );
        assert!(matches!(
            generator.generate_to(&mut Vec::new()),
            Err(Error::InvalidReportOutput(_))
        ));
    }

    #[test]
    fn test_load_descriptor() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("builds.jinja2"), "{{ builds | length }}").unwrap();
        let descriptor = temp.path().join("reports.yaml");
        fs::write(
            &descriptor,
            "reports:\n\
             \x20 - name: builds\n\
             \x20   template: builds.jinja2\n\
             \x20   output: builds.txt\n\
             \x20   context:\n\
             \x20     builds:\n\
             \x20       type: Build\n\
             \x20       filters:\n\
             \x20         project: 1\n\
             \x20 - template: inline {{ 1 + 1 }}\n",
        )
        .unwrap();

        let mut generator = ReportGenerator::new("http://localhost:8000", None);
        assert_eq!(generator.load_descriptor(&descriptor).unwrap(), 2);

        let reports = generator.reports();
        assert_eq!(reports[0].name, "builds");
        assert_eq!(reports[0].output, ReportOutput::File(temp.path().join("builds.txt")));
        assert!(reports[0].template.ends_with("builds.jinja2"));
        assert_eq!(reports[1].template, "inline {{ 1 + 1 }}");
        assert_eq!(reports[1].output, ReportOutput::Stdout);
    }
}
