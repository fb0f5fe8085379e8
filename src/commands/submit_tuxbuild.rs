//! Submit a TuxBuild `build.json`

use super::utils::{group_project, or_exit};
use super::{Command, FAILURE, SUCCESS};
use crate::api::SquadApi;
use crate::error::Result;
use crate::tux::{load_builds, submit_tuxbuild};
use crate::ui::UI;
use std::path::PathBuf;

pub struct SubmitTuxbuildCommand {
    api: SquadApi,
    group: String,
    project: String,
    tuxbuild: PathBuf,
}

impl SubmitTuxbuildCommand {
    pub fn new(api: SquadApi, group: String, project: String, tuxbuild: PathBuf) -> Self {
        SubmitTuxbuildCommand {
            api,
            group,
            project,
            tuxbuild,
        }
    }
}

impl Command for SubmitTuxbuildCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        let builds = or_exit!(ui, load_builds(&self.tuxbuild));
        let slug = group_project(&self.group, &self.project);
        let ok = or_exit!(ui, submit_tuxbuild(&self.api, &slug, &builds));
        Ok(if ok { SUCCESS } else { FAILURE })
    }

    fn name(&self) -> &str {
        "submit-tuxbuild"
    }

    fn help(&self) -> &str {
        "submit tuxbuild results to SQUAD"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use mockito::{Matcher, Server};
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn build(kconfig: Value, arch: &str) -> Value {
        json!({
            "build_status": "pass",
            "git_describe": "next-20201021",
            "kconfig": kconfig,
            "target_arch": arch,
            "toolchain": "gcc-9",
            "download_url": "https://builds.tuxbuild.com/abc/",
            "duration": 541,
            "git_repo": "https://git.kernel.org/pub/scm/linux/kernel/git/next/linux-next.git",
            "git_sha": "5302568121ba345f5c22528aefd72d775f25221e",
            "git_short_log": "5302568121ba (\"Add linux-next specific files for 20201021\")",
            "kernel_version": "5.9.0",
            "warnings_count": 2
        })
    }

    fn command(server: &Server, path: PathBuf) -> SubmitTuxbuildCommand {
        SubmitTuxbuildCommand::new(
            SquadApi::configure(&server.url(), Some("token")).unwrap(),
            "my_group".to_string(),
            "my_project".to_string(),
            path,
        )
    }

    #[test]
    fn test_submit_tuxbuild() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.json");
        let builds = json!([build(json!(["defconfig"]), "x86_64"), build(json!(["tinyconfig"]), "arm64")]);
        fs::write(&path, builds.to_string()).unwrap();

        let mut server = Server::new();
        let x86 = server
            .mock("POST", "/api/submit/my_group/my_project/next-20201021/x86_64")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("tests".into(), r#"{"build/gcc-9-defconfig":"pass"}"#.into()),
                Matcher::UrlEncoded(
                    "metrics".into(),
                    r#"{"build/gcc-9-defconfig-duration":541,"build/gcc-9-defconfig-warnings":2}"#.into(),
                ),
            ]))
            .with_status(201)
            .expect(1)
            .create();
        let arm = server
            .mock("POST", "/api/submit/my_group/my_project/next-20201021/arm64")
            .with_status(201)
            .expect(1)
            .create();

        let mut ui = TestUI::new();
        assert_eq!(command(&server, path).execute(&mut ui).unwrap(), SUCCESS);
        x86.assert();
        arm.assert();
    }

    #[test]
    fn test_invalid_build_status() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.json");
        let mut entry = build(json!(["defconfig"]), "x86_64");
        entry["build_status"] = json!("unknown");
        fs::write(&path, json!([entry]).to_string()).unwrap();

        let mut server = Server::new();
        let mock = server.mock("POST", Matcher::Any).expect(0).create();

        let mut ui = TestUI::new();
        assert_eq!(command(&server, path).execute(&mut ui).unwrap(), FAILURE);
        assert!(ui.errors[0].starts_with("Failed to load build json"));
        mock.assert();
    }

    #[test]
    fn test_duplicated_kconfig() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.json");
        let entry = build(json!(["defconfig", "defconfig"]), "x86_64");
        fs::write(&path, json!([entry]).to_string()).unwrap();

        let server = Server::new();
        let mut ui = TestUI::new();
        assert_eq!(command(&server, path).execute(&mut ui).unwrap(), FAILURE);
        assert!(ui.errors[0].contains("unique"));
    }
}
