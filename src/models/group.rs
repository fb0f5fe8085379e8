use super::{fetch, squad_object, Count, LocalId, Objects, Project, SquadObject};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Top level namespace owning projects
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip)]
    pub(crate) local_id: LocalId,
}

squad_object!(Group, "Group", "/api/groups/");

impl Group {
    pub fn with_slug(slug: impl Into<String>) -> Self {
        Group {
            slug: Some(slug.into()),
            ..Default::default()
        }
    }

    fn server_id(&self) -> Result<u64> {
        self.id.ok_or_else(|| {
            Error::ObjectState(format!(
                "Group \"{}\" has not been saved",
                self.slug.as_deref().unwrap_or_default()
            ))
        })
    }

    pub fn projects(&self, api: &SquadApi, filters: &Filters, count: Count) -> Result<Objects<Project>> {
        let filters = filters.clone().with("group", self.server_id()?);
        fetch(api, Project::ENDPOINT, &filters, count)
    }

    pub fn project(&self, api: &SquadApi, slug: &str) -> Result<Option<Project>> {
        let filters = Filters::new().with("slug", slug);
        Ok(self.projects(api, &filters, Count::Limit(1))?.into_first())
    }

    /// Create a project in this group with the given plugins, defaulting to
    /// `linux-log-parser`
    pub fn create_project(
        &self,
        api: &SquadApi,
        slug: &str,
        plugins: Option<Vec<String>>,
    ) -> Result<Project> {
        let mut project = Project {
            slug: Some(slug.to_string()),
            group: Some(super::Link::from_object(self.clone())),
            enabled_plugins_list: plugins,
            ..Default::default()
        };
        project.save(api)?;
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_projects_filter_by_group() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/api/projects/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("group".into(), "3".into()),
                Matcher::UrlEncoded("slug".into(), "linux".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_body(json!({"next": null, "results": [{"id": 9, "slug": "linux"}]}).to_string())
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let group = Group {
            id: Some(3),
            ..Default::default()
        };
        let project = group.project(&api, "linux").unwrap().unwrap();
        mock.assert();
        assert_eq!(project.id, Some(9));
    }

    #[test]
    fn test_unsaved_group_has_no_projects() {
        let api = SquadApi::configure("http://localhost:8000", None).unwrap();
        let group = Group::default();
        let result = group.projects(&api, &Filters::new(), Count::DEFAULT);
        assert!(matches!(result, Err(Error::ObjectState(_))));
    }

    #[test]
    fn test_create_project_posts_group_url() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/projects/")
            .match_body(Matcher::PartialJson(json!({
                "slug": "new-project",
                "group": "http://localhost/api/groups/3/",
                "enabled_plugins_list": ["linux-log-parser"],
            })))
            .with_status(201)
            .with_body(json!({"id": 10, "slug": "new-project"}).to_string())
            .create();

        let api = SquadApi::configure(&server.url(), None).unwrap();
        let group = Group {
            id: Some(3),
            url: Some("http://localhost/api/groups/3/".to_string()),
            ..Default::default()
        };
        let project = group.create_project(&api, "new-project", None).unwrap();
        mock.assert();
        assert_eq!(project.id, Some(10));
    }
}
