//! Helpers shared by command implementations

use super::FAILURE;
use crate::error::{Error, Result};
use crate::ui::UI;

/// `group/project` slug expected by the submission shortcuts
pub fn group_project(group: &str, project: &str) -> String {
    format!("{}/{}", group, project)
}

/// Print `message` and give back the failure exit code
pub fn fail(ui: &mut dyn UI, message: &str) -> Result<i32> {
    ui.error(message)?;
    Ok(FAILURE)
}

/// Turn errors caused by user input into a printed message and a failure
/// exit code. Transport and I/O problems still propagate.
pub fn or_fail<T>(ui: &mut dyn UI, result: Result<T>) -> Result<std::result::Result<T, i32>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(
            err @ (Error::InputFile { .. }
            | Error::Parse(_)
            | Error::Validation(_)
            | Error::InvalidBuildJson(_)
            | Error::InvalidLookup(_)
            | Error::InvalidTemplate(_)
            | Error::InvalidReportOutput(_)
            | Error::Template(_)
            | Error::InvalidObjectType(_)
            | Error::Yaml(_)
            | Error::Json(_)),
        ) => {
            ui.error(&err.to_string())?;
            Ok(Err(FAILURE))
        }
        Err(err) => Err(err),
    }
}

/// Unwrap a result of user input, or print the error and return the
/// failure exit code from the calling command
macro_rules! or_exit {
    ($ui:expr, $result:expr) => {
        match $crate::commands::utils::or_fail($ui, $result)? {
            Ok(value) => value,
            Err(code) => return Ok(code),
        }
    };
}
pub(crate) use or_exit;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::test_ui::TestUI;
    use std::path::PathBuf;

    #[test]
    fn test_group_project() {
        assert_eq!(group_project("lkft", "linux-next"), "lkft/linux-next");
    }

    #[test]
    fn test_or_fail_reports_input_errors() {
        let mut ui = TestUI::new();
        let result: Result<()> = Err(Error::InputFile {
            path: PathBuf::from("results.json"),
            reason: "file does not exist".to_string(),
        });

        let outcome = or_fail(&mut ui, result).unwrap();
        assert_eq!(outcome, Err(FAILURE));
        assert_eq!(
            ui.errors,
            vec!["Invalid input file results.json: file does not exist"]
        );
    }

    #[test]
    fn test_or_fail_propagates_other_errors() {
        let mut ui = TestUI::new();
        let result: Result<()> = Err(Error::Forbidden("http://localhost/api/".to_string()));
        assert!(or_fail(&mut ui, result).is_err());
        assert!(ui.errors.is_empty());
    }
}
