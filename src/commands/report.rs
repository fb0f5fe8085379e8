//! Generate the reports listed in a YAML descriptor

use super::utils::{fail, or_exit};
use super::{Command, SUCCESS};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::report::{ReportGenerator, ReportOutput};
use crate::ui::UI;
use std::path::PathBuf;

pub struct ReportCommand {
    config: ClientConfig,
    descriptor: PathBuf,
}

impl ReportCommand {
    pub fn new(config: ClientConfig, descriptor: PathBuf) -> Self {
        ReportCommand { config, descriptor }
    }
}

impl Command for ReportCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let mut generator = ReportGenerator::from_config(self.config.clone());
        if or_exit!(ui, generator.load_descriptor(&self.descriptor)) == 0 {
            return fail(
                ui,
                &format!("No reports found in \"{}\"", self.descriptor.display()),
            );
        }

        let mut rendered = Vec::new();
        let reports = or_exit!(ui, generator.generate_to(&mut rendered));
        ui.output_bytes(&rendered)?;

        for report in reports {
            if let ReportOutput::File(path) = &report.output {
                ui.output(&format!(
                    "Report \"{}\" written to {}",
                    report.name,
                    path.display()
                ))?;
            }
        }

        Ok(SUCCESS)
    }

    fn name(&self) -> &str {
        "report"
    }

    fn help(&self) -> &str {
        "generate reports from yaml descriptor file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::FAILURE;
    use crate::ui::test_ui::TestUI;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const DESCRIPTOR: &str = r#"
reports:
  - name: groups
    template: "{% for g in groups %}{{ g.slug }};{% endfor %}"
    context:
      groups:
        type: Group
        filters:
          slug__startswith: lkft
  - name: projects
    template: projects.jinja2
    output: projects.txt
    context:
      all projects:
        type: Project
"#;

    #[test]
    fn test_report_descriptor() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/groups/")
            .match_query(Matcher::UrlEncoded("slug__startswith".into(), "lkft".into()))
            .with_body(
                json!({"next": null, "results": [{"id": 1, "slug": "lkft"}, {"id": 2, "slug": "lkft-android"}]})
                    .to_string(),
            )
            .create();
        server
            .mock("GET", "/api/projects/")
            .match_query(Matcher::Any)
            .with_body(json!({"next": null, "results": [{"id": 3, "slug": "linux-next"}]}).to_string())
            .create();

        let temp = TempDir::new().unwrap();
        let descriptor = temp.path().join("reports.yaml");
        fs::write(&descriptor, DESCRIPTOR).unwrap();
        fs::write(
            temp.path().join("projects.jinja2"),
            "{{ all_projects | length }} project(s)",
        )
        .unwrap();

        let mut ui = TestUI::new();
        let cmd = ReportCommand::new(ClientConfig::new(server.url()), descriptor);
        assert_eq!(cmd.execute(&mut ui).unwrap(), SUCCESS);

        assert_eq!(String::from_utf8_lossy(&ui.bytes_output), "lkft;lkft-android;\n");
        assert_eq!(
            fs::read_to_string(temp.path().join("projects.txt")).unwrap(),
            "1 project(s)"
        );
        assert_eq!(
            ui.output,
            vec![format!(
                "Report \"projects\" written to {}",
                temp.path().join("projects.txt").display()
            )]
        );
    }

    #[test]
    fn test_report_missing_template() {
        let server = Server::new();
        let temp = TempDir::new().unwrap();
        let descriptor = temp.path().join("reports.yaml");
        fs::write(&descriptor, "reports:\n  - template: missing.jinja2\n").unwrap();

        let mut ui = TestUI::new();
        let cmd = ReportCommand::new(ClientConfig::new(server.url()), descriptor);
        assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
        assert!(ui.errors[0].contains("not found"));
    }

    #[test]
    fn test_report_empty_descriptor() {
        let server = Server::new();
        let temp = TempDir::new().unwrap();
        let descriptor = temp.path().join("reports.yaml");
        fs::write(&descriptor, "reports: []\n").unwrap();

        let mut ui = TestUI::new();
        let cmd = ReportCommand::new(ClientConfig::new(server.url()), descriptor);
        assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
    }
}
