use super::{squad_object, Link, LocalId, Project};
use serde::{Deserialize, Serialize};

/// Where tests run: a board, an emulator, an architecture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_test_runs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Link<Project>>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Environment, "Environment", "/api/environments/");

impl Environment {
    pub fn with_slug(slug: impl Into<String>) -> Self {
        Environment {
            slug: Some(slug.into()),
            ..Default::default()
        }
    }
}
