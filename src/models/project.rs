use super::{
    fetch, retrieve, squad_object, Build, Count, Environment, Group, Link, LocalId,
    MetricThreshold, Objects, Suite, SquadObject,
};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Plugins enabled on projects created without an explicit list
pub const DEFAULT_PLUGINS: &[&str] = &["linux-log-parser"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_email_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_plugins_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Link<Group>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_mail: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub important_metadata_keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderate_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_before_notification: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_settings: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Project, "Project", "/api/projects/", pre_save = default_plugins);

impl Project {
    pub fn with_slug(slug: impl Into<String>) -> Self {
        Project {
            slug: Some(slug.into()),
            ..Default::default()
        }
    }

    /// Attach the owning group, e.g. when preparing a submission
    pub fn in_group(mut self, group: Group) -> Self {
        self.group = Some(Link::from_object(group));
        self
    }

    fn default_plugins(&mut self) {
        if self.enabled_plugins_list.is_none() {
            self.enabled_plugins_list =
                Some(DEFAULT_PLUGINS.iter().map(|p| p.to_string()).collect());
        }
    }

    fn server_id(&self) -> Result<u64> {
        self.id.ok_or_else(|| {
            Error::ObjectState(format!(
                "Project \"{}\" has not been saved",
                self.slug.as_deref().unwrap_or_default()
            ))
        })
    }

    fn scoped(&self, filters: &Filters) -> Result<Filters> {
        Ok(filters.clone().with("project", self.server_id()?))
    }

    pub fn builds(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Build>> {
        fetch(api, Build::ENDPOINT, &self.scoped(filters)?, count)
    }

    pub fn build(&self, api: &SquadApi, version: &str) -> Result<Option<Build>> {
        let filters = Filters::new().with("version", version);
        Ok(self.builds(api, &filters, Count::Limit(1))?.into_first())
    }

    pub fn environments(
        &self,
        api: &SquadApi,
        filters: &Filters,
        count: Count,
    ) -> Result<Objects<Environment>> {
        fetch(api, Environment::ENDPOINT, &self.scoped(filters)?, count)
    }

    pub fn environment(&self, api: &SquadApi, slug: &str) -> Result<Option<Environment>> {
        let filters = Filters::new().with("slug", slug);
        Ok(self.environments(api, &filters, Count::Limit(1))?.into_first())
    }

    pub fn suites(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Suite>> {
        fetch(api, Suite::ENDPOINT, &self.scoped(filters)?, count)
    }

    pub fn suite(&self, api: &SquadApi, slug: &str) -> Result<Option<Suite>> {
        let filters = Filters::new().with("slug", slug);
        Ok(self.suites(api, &filters, Count::Limit(1))?.into_first())
    }

    pub fn thresholds(
        &self,
        api: &SquadApi,
        filters: &Filters,
        count: Count,
    ) -> Result<Objects<MetricThreshold>> {
        fetch(api, MetricThreshold::ENDPOINT, &self.scoped(filters)?, count)
    }

    /// Ask the server to compare two builds of the same project, `by` being
    /// `tests` or `metrics`
    pub fn compare_builds(
        api: &SquadApi,
        baseline_id: u64,
        build_id: u64,
        by: &str,
        force: bool,
    ) -> Result<serde_json::Value> {
        let baseline: Build = retrieve(api, baseline_id)?;
        let to_compare: Build = retrieve(api, build_id)?;

        let project_id = baseline.project.as_ref().and_then(Link::id);
        if project_id.is_none() || project_id != to_compare.project.as_ref().and_then(Link::id) {
            return Err(Error::InvalidLookup(
                "Argument builds must belong to same project".to_string(),
            ));
        }

        let mut params = Filters::new()
            .with("baseline", baseline_id)
            .with("to_compare", build_id)
            .with("by", by);
        if force {
            params.insert("force", 1);
        }

        let endpoint = format!(
            "{}{}/compare_builds/",
            Self::ENDPOINT,
            project_id.unwrap_or_default()
        );
        api.get(&endpoint, &params)?.error_for_status()?.json()
    }
}
