//! Save the attachments of a test run to disk

use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::shortcuts::download_attachments;
use crate::ui::UI;
use std::path::PathBuf;

pub struct DownloadAttachmentsCommand {
    api: SquadApi,
    testrun: u64,
    filenames: Vec<String>,
    output_dir: PathBuf,
}

impl DownloadAttachmentsCommand {
    /// Download every attachment of `testrun` into the current directory
    pub fn new(api: SquadApi, testrun: u64) -> Self {
        DownloadAttachmentsCommand {
            api,
            testrun,
            filenames: Vec::new(),
            output_dir: PathBuf::from("."),
        }
    }

    /// Only download these files
    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }
}

impl Command for DownloadAttachmentsCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        if download_attachments(&self.api, self.testrun, &self.filenames, &self.output_dir)? {
            Ok(SUCCESS)
        } else {
            ui.error(&format!(
                "Could not download attachments of TestRun {}",
                self.testrun
            ))?;
            Ok(FAILURE)
        }
    }

    fn name(&self) -> &str {
        "download-attachments"
    }

    fn help(&self) -> &str {
        "download the attachments from a SQUAD testrun"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_download_selected_attachment() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/testruns/")
            .match_query(Matcher::UrlEncoded("id".into(), "12".into()))
            .with_body(json!({"next": null, "results": [{"id": 12}]}).to_string())
            .create();
        server
            .mock("GET", "/api/testruns/12/attachments/")
            .match_query(Matcher::Missing)
            .with_body(
                json!([
                    {"filename": "dmesg.txt", "mimetype": "text/plain", "length": 5},
                    {"filename": "screenshot.png", "mimetype": "image/png", "length": 4},
                ])
                .to_string(),
            )
            .create();
        let dmesg = server
            .mock("GET", "/api/testruns/12/attachments/")
            .match_query(Matcher::UrlEncoded("filename".into(), "dmesg.txt".into()))
            .with_body("boot\n")
            .expect(1)
            .create();
        let png = server
            .mock("GET", "/api/testruns/12/attachments/")
            .match_query(Matcher::UrlEncoded("filename".into(), "screenshot.png".into()))
            .expect(0)
            .create();

        let temp = TempDir::new().unwrap();
        let cmd = DownloadAttachmentsCommand::new(
            SquadApi::configure(&server.url(), None).unwrap(),
            12,
        )
        .with_filenames(vec!["dmesg.txt".to_string()])
        .with_output_dir(temp.path().join("attachments"));

        let mut ui = TestUI::new();
        assert_eq!(cmd.execute(&mut ui).unwrap(), SUCCESS);
        assert_eq!(
            fs::read_to_string(temp.path().join("attachments/dmesg.txt")).unwrap(),
            "boot\n"
        );
        dmesg.assert();
        png.assert();
    }

    #[test]
    fn test_unknown_testrun() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/testruns/")
            .match_query(Matcher::Any)
            .with_body(json!({"next": null, "results": []}).to_string())
            .create();

        let mut ui = TestUI::new();
        let cmd = DownloadAttachmentsCommand::new(
            SquadApi::configure(&server.url(), None).unwrap(),
            404,
        );
        assert_eq!(cmd.execute(&mut ui).unwrap(), FAILURE);
        assert_eq!(ui.errors, vec!["Could not download attachments of TestRun 404"]);
    }
}
