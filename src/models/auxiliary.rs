//! Entities that only carry data: no helpers beyond listing, save and delete

use super::{squad_object, Build, Environment, Link, LocalId, Project, Record, SquadObject};
use serde::{Deserialize, Serialize};

/// A CI backend (LAVA, TuxSuite, ...) jobs are submitted to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Backend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Address of the backend itself, not of this API resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fetch_attempts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_enabled: Option<bool>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

impl Record for Backend {
    const TYPE_NAME: &'static str = "Backend";

    fn id(&self) -> Option<u64> {
        self.id
    }

    fn local_id(&self) -> uuid::Uuid {
        self.local_id.0
    }
}

impl SquadObject for Backend {
    const ENDPOINT: &'static str = "/api/backends/";

    fn url(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(EmailTemplate, "EmailTemplate", "/api/emailtemplates/");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermittent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environments: Option<Vec<String>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(KnownIssue, "KnownIssue", "/api/knownissues/");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions_to_reproduce: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(SuiteMetadata, "SuiteMetadata", "/api/suitemetadata/");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Link<Build>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Annotation, "Annotation", "/api/annotations/");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricThreshold {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_higher_better: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Link<Environment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Link<Project>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(MetricThreshold, "MetricThreshold", "/api/metricthresholds/");

/// A report requested from the server (rendered server-side)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_recipient_notified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_notified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Link<Build>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Link<EmailTemplate>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Report, "Report", "/api/reports/");
