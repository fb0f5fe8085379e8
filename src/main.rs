//! squad-client - command-line access to SQUAD

use clap::{Parser, Subcommand};
use squad_client::api::SquadApi;
use squad_client::commands::*;
use squad_client::config::ClientConfig;
use squad_client::logging;
use squad_client::shortcuts::ProjectOptions;
use squad_client::ui::{CliUI, UI};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser)]
#[command(name = "squad-client", version)]
#[command(about = "Command-line client for SQUAD", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Display debug messages
    #[arg(long, global = true)]
    debug: bool,

    /// SQUAD host, example: https://qa-reports.linaro.org
    #[arg(long, env = "SQUAD_HOST", global = true)]
    squad_host: Option<String>,

    /// SQUAD authentication token
    #[arg(long, env = "SQUAD_TOKEN", global = true, hide_env_values = true)]
    squad_token: Option<String>,

    /// Cache API results for N number of seconds. Disabled by default.
    #[arg(long, default_value_t = 0, global = true)]
    cache: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit results to SQUAD
    Submit {
        /// SQUAD group where results are stored
        #[arg(long)]
        group: String,

        /// SQUAD project where results are stored
        #[arg(long)]
        project: String,

        /// Build version where results are stored
        #[arg(long)]
        build: Option<String>,

        /// Build environment where results are stored
        #[arg(long)]
        environment: Option<String>,

        /// File with test results to submit. Max 5MB. JSON and YAML formats are supported
        #[arg(long, conflicts_with = "result_name")]
        results: Option<PathBuf>,

        /// Single result name. Please use suite_name/test_name as value for this parameter
        #[arg(long)]
        result_name: Option<String>,

        /// Single result output
        #[arg(long, value_parser = ["pass", "fail", "skip"])]
        result_value: Option<String>,

        /// Layout of the results file, if any
        #[arg(long, value_enum)]
        results_layout: Option<ResultsLayout>,

        /// File with metrics (benchmarks) to submit. Max 5MB. JSON and YAML formats are supported
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// File with metadata to submit. Max 5MB. JSON and YAML formats are supported
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Test log file path
        #[arg(long)]
        logs: Option<PathBuf>,

        /// Job attachments. Multiple files are allowed
        #[arg(long, num_args = 1..)]
        attachments: Vec<PathBuf>,
    },

    /// Submit job requests to SQUAD
    #[command(name = "submit-job")]
    SubmitJob {
        #[arg(long)]
        group: String,

        #[arg(long)]
        project: String,

        #[arg(long)]
        build: String,

        #[arg(long)]
        environment: String,

        /// SQUAD backend to be used to process results
        #[arg(long)]
        backend: String,

        /// File containing the job definition
        #[arg(long)]
        definition: PathBuf,
    },

    /// Submit tuxbuild results to SQUAD
    #[command(name = "submit-tuxbuild")]
    SubmitTuxbuild {
        #[arg(long)]
        group: String,

        #[arg(long)]
        project: String,

        /// File with tuxbuild results to submit
        tuxbuild: PathBuf,
    },

    /// Submit TuxSuite results to SQUAD
    #[command(name = "submit-tuxsuite")]
    SubmitTuxsuite {
        #[arg(long)]
        group: String,

        #[arg(long)]
        project: String,

        /// SQUAD build where results are stored, read from the first build's
        /// status.json when not given
        #[arg(long)]
        build: Option<String>,

        /// SQUAD backend to be used to process results
        #[arg(long)]
        backend: String,

        /// File with tuxsuite results to submit
        #[arg(long)]
        json: PathBuf,

        /// Fetch results right away instead of waiting for TuxSuite
        #[arg(long)]
        fetch_now: bool,
    },

    /// Create or update a project in SQUAD
    #[command(name = "create-or-update-project")]
    CreateOrUpdateProject {
        #[arg(long)]
        group: String,

        /// SQUAD project slug
        #[arg(long)]
        slug: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Project settings in yaml/json
        #[arg(long)]
        settings: Option<String>,

        #[arg(long, conflicts_with = "is_private")]
        is_public: bool,

        #[arg(long)]
        is_private: bool,

        /// Enable html emails
        #[arg(long, conflicts_with = "no_html_mail")]
        html_mail: bool,

        #[arg(long)]
        no_html_mail: bool,

        /// Enable moderating notifications
        #[arg(long, conflicts_with = "no_moderate_notifications")]
        moderate_notifications: bool,

        #[arg(long)]
        no_moderate_notifications: bool,

        /// Email template name to use, SQUAD's default if none is given
        #[arg(long)]
        email_template: Option<String>,

        /// Plugins to enable separated by comma
        #[arg(long)]
        plugins: Option<String>,

        /// Important metadata keys separated by comma
        #[arg(long)]
        important_metadata_keys: Option<String>,

        /// Wait this many seconds before sending notifications
        #[arg(long)]
        wait_before_notification_timeout: Option<u64>,

        /// Force sending build notifications after this many seconds
        #[arg(long)]
        notification_timeout: Option<u64>,

        /// Delete builds older than this number of days. 0 or less disables it
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        data_retention: i64,

        /// Hide the project from the group page
        #[arg(long)]
        is_archived: bool,

        /// Fail if the project already exists
        #[arg(long)]
        no_overwrite: bool,

        /// Return with exit code only, do not print anything
        #[arg(long)]
        silent: bool,

        /// Metric thresholds of the project, e.g. "build/*-warnings"
        #[arg(long, num_args = 0..)]
        thresholds: Vec<String>,
    },

    /// Register callback to a build in SQUAD
    #[command(name = "register-callback")]
    RegisterCallback {
        #[arg(long)]
        group: String,

        #[arg(long)]
        project: String,

        #[arg(long)]
        build: String,

        /// URL to be triggered by the callback
        #[arg(long)]
        url: String,

        /// Store the callback's response
        #[arg(long)]
        record_response: bool,
    },

    /// Download test results from SQUAD
    #[command(name = "download-results")]
    DownloadResults {
        #[arg(long)]
        group: String,

        #[arg(long)]
        project: String,

        /// Build version, or one of the aliases latest and latest-finished
        #[arg(long)]
        build: String,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        suite: Option<String>,

        /// Output file, <group>-<project>-<build>.txt by default
        #[arg(long)]
        filename: Option<PathBuf>,
    },

    /// Download the attachments from a SQUAD testrun
    #[command(name = "download-attachments")]
    DownloadAttachments {
        /// The SQUAD ID of the testrun
        #[arg(long)]
        testrun: u64,

        /// Only download these files
        #[arg(long, num_args = 1..)]
        filenames: Vec<String>,

        /// Directory where files are written
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Generate reports from yaml descriptor file
    Report {
        /// YAML file listing the reports
        descriptor: PathBuf,
    },

    /// Display versions of squad-client and server
    Version,

    /// Query SQUAD objects from a script or stdin
    Shell {
        /// File with one query per line
        script: Option<PathBuf>,
    },
}

fn build_command(command: Commands, config: ClientConfig, api: SquadApi) -> Box<dyn Command> {
    match command {
        Commands::Submit {
            group,
            project,
            build,
            environment,
            results,
            result_name,
            result_value,
            results_layout,
            metrics,
            metadata,
            logs,
            attachments,
        } => Box::new(SubmitCommand::new(
            api,
            SubmitArgs {
                group,
                project,
                build,
                environment,
                results,
                result_name,
                result_value,
                results_layout,
                metrics,
                metadata,
                logs,
                attachments,
            },
        )),
        Commands::SubmitJob {
            group,
            project,
            build,
            environment,
            backend,
            definition,
        } => Box::new(SubmitJobCommand::new(
            api,
            group,
            project,
            build,
            environment,
            backend,
            definition,
        )),
        Commands::SubmitTuxbuild {
            group,
            project,
            tuxbuild,
        } => Box::new(SubmitTuxbuildCommand::new(api, group, project, tuxbuild)),
        Commands::SubmitTuxsuite {
            group,
            project,
            build,
            backend,
            json,
            fetch_now,
        } => Box::new(
            SubmitTuxSuiteCommand::new(api, group, project, backend, json)
                .with_build(build)
                .with_fetch_now(fetch_now),
        ),
        Commands::CreateOrUpdateProject {
            group,
            slug,
            name,
            description,
            settings,
            is_public,
            is_private,
            html_mail,
            no_html_mail,
            moderate_notifications,
            no_moderate_notifications,
            email_template,
            plugins,
            important_metadata_keys,
            wait_before_notification_timeout,
            notification_timeout,
            data_retention,
            is_archived,
            no_overwrite,
            silent,
            thresholds,
        } => {
            let options = ProjectOptions {
                name,
                description,
                settings,
                is_public: resolve_boolean_flag(is_public, is_private),
                html_mail: resolve_boolean_flag(html_mail, no_html_mail),
                moderate_notifications: resolve_boolean_flag(
                    moderate_notifications,
                    no_moderate_notifications,
                ),
                is_archived: Some(is_archived),
                email_template,
                plugins: split_list(plugins.as_deref()),
                important_metadata_keys: split_list(important_metadata_keys.as_deref()),
                wait_before_notification_timeout,
                notification_timeout,
                data_retention: Some(data_retention),
                no_overwrite,
                thresholds,
            };
            Box::new(CreateOrUpdateProjectCommand::new(api, group, slug, options).silent(silent))
        }
        Commands::RegisterCallback {
            group,
            project,
            build,
            url,
            record_response,
        } => Box::new(RegisterCallbackCommand::new(
            api,
            group,
            project,
            build,
            url,
            record_response,
        )),
        Commands::DownloadResults {
            group,
            project,
            build,
            environment,
            suite,
            filename,
        } => Box::new(
            DownloadResultsCommand::new(api, group, project, build)
                .with_environment(environment)
                .with_suite(suite)
                .with_filename(filename),
        ),
        Commands::DownloadAttachments {
            testrun,
            filenames,
            output_dir,
        } => Box::new(
            DownloadAttachmentsCommand::new(api, testrun)
                .with_filenames(filenames)
                .with_output_dir(output_dir),
        ),
        Commands::Report { descriptor } => Box::new(ReportCommand::new(config, descriptor)),
        Commands::Version => Box::new(VersionCommand::new(api)),
        Commands::Shell { script } => Box::new(ShellCommand::new(api, script)),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { USAGE_ERROR } else { SUCCESS });
        }
    };

    logging::init(cli.debug);

    let Some(host) = cli.squad_host else {
        error!("Either --squad-host or SQUAD_HOST env variable are required");
        process::exit(USAGE_ERROR);
    };

    let config = ClientConfig::new(host)
        .with_token(cli.squad_token)
        .with_cache(cli.cache);

    let api = match SquadApi::from_config(config.clone()) {
        Ok(api) => api,
        Err(e) => {
            error!("Failed to configure squad api: {}", e);
            process::exit(USAGE_ERROR);
        }
    };

    let mut ui = CliUI::new();
    let command = build_command(cli.command, config, api);

    match command.execute(&mut ui) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            let _ = ui.error(&format!("Error: {}", e));
            process::exit(FAILURE);
        }
    }
}
