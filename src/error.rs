//! Error types for squad-client

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for squad-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for squad-client
#[derive(Error, Debug)]
pub enum Error {
    /// The SQUAD base URL is missing or does not look like a URL.
    #[error("Malformed url: \"{0}\"")]
    MalformedUrl(String),

    /// An absolute URL pointed at a different SQUAD instance.
    #[error("Given url ({0}) does not match pre-configured one!")]
    CrossOrigin(String),

    /// The server answered 401 and no token was configured.
    #[error("Unauthorized access to \"{0}\". Consider `export SQUAD_TOKEN=your-squad-token`")]
    Unauthorized(String),

    /// The server answered 403.
    #[error("Forbidden access to \"{0}\"")]
    Forbidden(String),

    /// Any other non-successful HTTP status.
    #[error("HTTP {status} from \"{url}\": {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// The server could not be reached.
    #[error("Error Connecting: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("Timeout Error: {0}")]
    Timeout(String),

    /// Unclassified HTTP client failure.
    #[error("Something unexpected happened while requesting the API: {0}")]
    Request(#[from] reqwest::Error),

    /// No entity type is registered under the given name.
    #[error("There is no SquadObject of type \"{0}\"")]
    InvalidObjectType(String),

    /// A lookup could not be satisfied (missing object, missing relation).
    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),

    /// An object is in a state that does not allow the operation.
    #[error("{0}")]
    ObjectState(String),

    /// The server rejected a save.
    #[error("Failed to save {kind}: {reason}")]
    SaveFailed { kind: String, reason: String },

    /// The server rejected a delete.
    #[error("Failed to delete {kind}: {reason}")]
    DeleteFailed { kind: String, reason: String },

    /// User supplied data did not pass validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A TuxBuild/TuxSuite results file is malformed.
    #[error("Failed to load build json: {0}")]
    InvalidBuildJson(String),

    /// A report template could not be found.
    #[error("Invalid report template: {0}")]
    InvalidTemplate(String),

    /// A report output sink could not be written.
    #[error("Invalid report output: {0}")]
    InvalidReportOutput(String),

    /// Configuration error or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse input data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Input file is missing or too big.
    #[error("Invalid input file {path}: {reason}")]
    InputFile { path: PathBuf, reason: String },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Response cache database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}
