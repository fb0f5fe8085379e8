//! Entry point for listings and submissions

use super::submit::SubmitRequest;
use super::{
    fetch, Annotation, Backend, Build, Count, EmailTemplate, Environment, Group, KnownIssue,
    Metric, MetricThreshold, Objects, Project, Report, SquadObject, Suite, SuiteMetadata, Test,
    TestJob, TestRun,
};
use crate::api::{ApiResponse, Filters, SquadApi};
use crate::error::{Error, Result};
use serde_json::Value;
use tracing::{error, info};

/// Names accepted by [`Squad::fetch_type`]
pub const TYPE_NAMES: &[&str] = &[
    "Group",
    "Project",
    "Build",
    "TestJob",
    "TestRun",
    "Test",
    "Metric",
    "Suite",
    "Environment",
    "Backend",
    "EmailTemplate",
    "KnownIssue",
    "SuiteMetadata",
    "Annotation",
    "MetricThreshold",
    "Report",
];

#[derive(Debug, Clone)]
pub struct Squad {
    api: SquadApi,
}

fn as_values<T: SquadObject>(objects: Objects<T>) -> Result<Vec<Value>> {
    objects
        .into_values()
        .iter()
        .map(|object| serde_json::to_value(object).map_err(Error::from))
        .collect()
}

/// Log the body of submissions the server did not accept
fn accepted(response: ApiResponse, what: &str) -> bool {
    if !matches!(response.status, 200 | 201 | 500) {
        error!("Failed to {}: {}", what, response.text());
    }
    response.is_success()
}

impl Squad {
    pub fn new(api: SquadApi) -> Self {
        Squad { api }
    }

    pub fn api(&self) -> &SquadApi {
        &self.api
    }

    pub fn fetch<T: SquadObject>(&self, filters: &Filters, count: Count) -> Result<Objects<T>> {
        fetch(&self.api, T::ENDPOINT, filters, count)
    }

    /// Listing of the entity named `type_name`, as JSON objects
    pub fn fetch_type(&self, type_name: &str, filters: &Filters, count: Count) -> Result<Vec<Value>> {
        match type_name {
            "Group" => as_values(self.fetch::<Group>(filters, count)?),
            "Project" => as_values(self.fetch::<Project>(filters, count)?),
            "Build" => as_values(self.fetch::<Build>(filters, count)?),
            "TestJob" => as_values(self.fetch::<TestJob>(filters, count)?),
            "TestRun" => as_values(self.fetch::<TestRun>(filters, count)?),
            "Test" => as_values(self.fetch::<Test>(filters, count)?),
            "Metric" => as_values(self.fetch::<Metric>(filters, count)?),
            "Suite" => as_values(self.fetch::<Suite>(filters, count)?),
            "Environment" => as_values(self.fetch::<Environment>(filters, count)?),
            "Backend" => as_values(self.fetch::<Backend>(filters, count)?),
            "EmailTemplate" => as_values(self.fetch::<EmailTemplate>(filters, count)?),
            "KnownIssue" => as_values(self.fetch::<KnownIssue>(filters, count)?),
            "SuiteMetadata" => as_values(self.fetch::<SuiteMetadata>(filters, count)?),
            "Annotation" => as_values(self.fetch::<Annotation>(filters, count)?),
            "MetricThreshold" => as_values(self.fetch::<MetricThreshold>(filters, count)?),
            "Report" => as_values(self.fetch::<Report>(filters, count)?),
            other => Err(Error::InvalidObjectType(other.to_string())),
        }
    }

    pub fn groups(&self, filters: &Filters, count: Count) -> Result<Objects<Group>> {
        self.fetch(filters, count)
    }

    pub fn group(&self, slug: &str) -> Result<Option<Group>> {
        let filters = Filters::new().with("slug", slug);
        Ok(self.groups(&filters, Count::Limit(1))?.into_first())
    }

    pub fn projects(&self, filters: &Filters, count: Count) -> Result<Objects<Project>> {
        self.fetch(filters, count)
    }

    pub fn builds(&self, filters: &Filters, count: Count) -> Result<Objects<Build>> {
        self.fetch(filters, count)
    }

    pub fn testjobs(&self, filters: &Filters, count: Count) -> Result<Objects<TestJob>> {
        self.fetch(filters, count)
    }

    pub fn testruns(&self, filters: &Filters, count: Count) -> Result<Objects<TestRun>> {
        self.fetch(filters, count)
    }

    pub fn tests(&self, filters: &Filters, count: Count) -> Result<Objects<Test>> {
        self.fetch(filters, count)
    }

    pub fn metrics(&self, filters: &Filters, count: Count) -> Result<Objects<Metric>> {
        self.fetch(filters, count)
    }

    pub fn suites(&self, filters: &Filters, count: Count) -> Result<Objects<Suite>> {
        self.fetch(filters, count)
    }

    pub fn environments(&self, filters: &Filters, count: Count) -> Result<Objects<Environment>> {
        self.fetch(filters, count)
    }

    pub fn backends(&self, filters: &Filters, count: Count) -> Result<Objects<Backend>> {
        self.fetch(filters, count)
    }

    pub fn emailtemplates(&self, filters: &Filters, count: Count) -> Result<Objects<EmailTemplate>> {
        self.fetch(filters, count)
    }

    pub fn knownissues(&self, filters: &Filters, count: Count) -> Result<Objects<KnownIssue>> {
        self.fetch(filters, count)
    }

    pub fn suitemetadata(&self, filters: &Filters, count: Count) -> Result<Objects<SuiteMetadata>> {
        self.fetch(filters, count)
    }

    pub fn annotations(&self, filters: &Filters, count: Count) -> Result<Objects<Annotation>> {
        self.fetch(filters, count)
    }

    pub fn metricthresholds(
        &self,
        filters: &Filters,
        count: Count,
    ) -> Result<Objects<MetricThreshold>> {
        self.fetch(filters, count)
    }

    pub fn reports(&self, filters: &Filters, count: Count) -> Result<Objects<Report>> {
        self.fetch(filters, count)
    }

    /// Send tests, metrics, metadata, log and attachments in one request
    pub fn submit(&self, request: &SubmitRequest) -> Result<bool> {
        let fields = request.form_fields();

        info!(
            "Submitting {} tests, {} metrics",
            request.tests.len(),
            request.metrics.len()
        );

        let endpoint = request.endpoint();
        let response = if request.attachments.is_empty() {
            self.api.post_form(&endpoint, fields)?
        } else {
            self.api
                .post_multipart(&endpoint, fields, request.attachments.clone())?
        };

        Ok(accepted(response, "submit results"))
    }

    /// Ask the server to submit `definition` to `backend`
    pub fn submitjob(
        &self,
        group: &str,
        project: &str,
        build: &str,
        environment: &str,
        backend: &str,
        definition: &str,
    ) -> Result<bool> {
        let endpoint = format!(
            "/api/submitjob/{}/{}/{}/{}",
            group, project, build, environment
        );
        info!("Submitting job request {}", endpoint);

        let fields = vec![
            ("backend".to_string(), backend.to_string()),
            ("definition".to_string(), definition.to_string()),
        ];
        let response = self.api.post_form(&endpoint, fields)?;
        Ok(accepted(response, "submit job request"))
    }

    /// Ask the server to follow an already running job
    #[allow(clippy::too_many_arguments)]
    pub fn watchjob(
        &self,
        group: &str,
        project: &str,
        build: &str,
        environment: &str,
        backend: &str,
        testjob_id: &str,
        delay_fetch: bool,
    ) -> Result<bool> {
        let endpoint = format!(
            "/api/watchjob/{}/{}/{}/{}",
            group, project, build, environment
        );
        info!("Watching job {} through {}", testjob_id, endpoint);

        let mut fields = vec![
            ("backend".to_string(), backend.to_string()),
            ("testjob_id".to_string(), testjob_id.to_string()),
        ];
        if delay_fetch {
            fields.push(("delay_fetch".to_string(), "true".to_string()));
        }
        let response = self.api.post_form(&endpoint, fields)?;
        Ok(accepted(response, "watch job"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::io::Write;

    fn squad(server: &Server) -> Squad {
        Squad::new(SquadApi::configure(&server.url(), Some("token")).unwrap())
    }

    #[test]
    fn test_group_not_found() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/groups/")
            .match_query(Matcher::UrlEncoded(
                "slug".into(),
                "this-group-does-not-really-exist".into(),
            ))
            .with_body(json!({"next": null, "results": []}).to_string())
            .create();

        let squad = squad(&server);
        assert!(squad
            .group("this-group-does-not-really-exist")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_listing_matches_retrieve() {
        let mut server = Server::new();
        let group = json!({"id": 1, "url": "http://x/api/groups/1/", "slug": "my_group",
                           "name": "My group", "description": "d"});
        server
            .mock("GET", "/api/groups/")
            .match_query(Matcher::Any)
            .with_body(json!({"next": null, "results": [group.clone()]}).to_string())
            .create();
        server
            .mock("GET", "/api/groups/1/")
            .with_body(group.to_string())
            .create();

        let squad = squad(&server);
        let listed = squad.groups(&Filters::new(), Count::DEFAULT).unwrap();
        let retrieved: Group = crate::models::retrieve(squad.api(), 1).unwrap();
        assert_eq!(
            serde_json::to_value(listed.first().unwrap()).unwrap(),
            serde_json::to_value(&retrieved).unwrap()
        );
    }

    #[test]
    fn test_fetch_type() {
        let mut server = Server::new();
        server
            .mock("GET", "/api/builds/")
            .match_query(Matcher::Any)
            .with_body(json!({"next": null, "results": [{"id": 1, "version": "v1"}]}).to_string())
            .create();

        let squad = squad(&server);
        let builds = squad.fetch_type("Build", &Filters::new(), Count::All).unwrap();
        assert_eq!(builds, vec![json!({"id": 1, "version": "v1"})]);

        let result = squad.fetch_type("Nope", &Filters::new(), Count::All);
        assert!(matches!(result, Err(Error::InvalidObjectType(_))));
    }

    #[test]
    fn test_submit_with_attachment_is_multipart() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/submit/g/p/b/e")
            .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
            .match_body(Matcher::Regex("attachment".into()))
            .with_status(201)
            .create();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "attached").unwrap();

        let mut request = SubmitRequest::new("g", "p", "b", "e");
        request.tests = vec![Test::new("s/t", "pass")];
        request.attachments = vec![file.path().to_path_buf()];

        assert!(squad(&server).submit(&request).unwrap());
        mock.assert();
    }

    #[test]
    fn test_submit_rejected() {
        let mut server = Server::new();
        server
            .mock("POST", "/api/submit/g/p/b/e")
            .with_status(400)
            .with_body("bad")
            .create();

        let mut request = SubmitRequest::new("g", "p", "b", "e");
        request.tests = vec![Test::new("s/t", "pass")];
        assert!(!squad(&server).submit(&request).unwrap());
    }

    #[test]
    fn test_watchjob() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/watchjob/g/p/b/e")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("backend".into(), "tuxsuite.com".into()),
                Matcher::UrlEncoded("testjob_id".into(), "TEST:linaro@anders#1".into()),
                Matcher::UrlEncoded("delay_fetch".into(), "true".into()),
            ]))
            .with_status(201)
            .create();

        assert!(squad(&server)
            .watchjob("g", "p", "b", "e", "tuxsuite.com", "TEST:linaro@anders#1", true)
            .unwrap());
        mock.assert();
    }
}
