//! squad-client - client library and command-line tool for SQUAD
//!
//! SQUAD is a test results database: projects own builds, builds own test
//! runs per environment, test runs hold tests and metrics. This crate talks
//! to its REST API.
//!
//! # Architecture
//!
//! - [`api`]: HTTP transport, URL validation and the optional response cache
//! - [`models`]: typed entities, lazy relations and paginated listings
//! - [`shortcuts`]: high level operations (submit results, create projects,
//!   download results)
//! - [`tux`]: TuxBuild and TuxSuite result ingestion
//! - [`report`]: Jinja reports rendered from fetched objects
//! - [`commands`]: the `squad-client` subcommands
//! - [`config`]: tunables and [`config::ClientConfig`]
//! - [`input`]: JSON/YAML/text input files
//! - [`logging`]: `tracing` subscriber setup
//! - [`ui`]: output abstraction for commands
//! - [`error`]: error types and Result alias
//!
//! # Example
//!
//! ```no_run
//! use squad_client::api::{Filters, SquadApi};
//! use squad_client::models::{Count, Squad};
//!
//! # fn main() -> squad_client::Result<()> {
//! let api = SquadApi::configure("https://qa-reports.linaro.org", None)?;
//! let squad = Squad::new(api);
//!
//! let filters = Filters::new().with("ordering", "-id");
//! for build in squad.builds(&filters, Count::Limit(5))? {
//!     println!("{}", build.version.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod logging;
pub mod models;
pub mod report;
pub mod shortcuts;
pub mod tux;
pub mod ui;

pub use error::{Error, Result};
