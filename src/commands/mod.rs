//! Command system for squad-client
//!
//! Every subcommand is a struct holding its parsed arguments and an API
//! handle, executed through the [`Command`] trait. `execute` returns the
//! process exit code: 0 on success, 1 when the operation failed.

use crate::error::Result;
use crate::ui::UI;

pub mod create_or_update_project;
pub mod download_attachments;
pub mod download_results;
pub mod register_callback;
pub mod report;
pub mod shell;
pub mod submit;
pub mod submit_job;
pub mod submit_tuxbuild;
pub mod submit_tuxsuite;
mod utils;
pub mod version;

pub use create_or_update_project::{resolve_boolean_flag, split_list, CreateOrUpdateProjectCommand};
pub use download_attachments::DownloadAttachmentsCommand;
pub use download_results::DownloadResultsCommand;
pub use register_callback::RegisterCallbackCommand;
pub use report::ReportCommand;
pub use shell::ShellCommand;
pub use submit::{ResultsLayout, SubmitArgs, SubmitCommand};
pub use submit_job::SubmitJobCommand;
pub use submit_tuxbuild::SubmitTuxbuildCommand;
pub use submit_tuxsuite::SubmitTuxSuiteCommand;
pub use version::VersionCommand;

/// Exit code of a successful command
pub const SUCCESS: i32 = 0;

/// Exit code of a command that ran but could not do its job
pub const FAILURE: i32 = 1;

/// Exit code for invalid invocations
pub const USAGE_ERROR: i32 = -1;

/// Trait that all commands must implement
pub trait Command {
    /// Execute the command
    fn execute(&self, ui: &mut dyn UI) -> Result<i32>;

    /// Get the command name
    fn name(&self) -> &str;

    /// Get command help text
    fn help(&self) -> &str;
}
