//! HTTP transport for the SQUAD REST API
//!
//! [`SquadApi`] owns the base URL, the optional token and the blocking HTTP
//! client. Every request goes through [`SquadApi::request`], which resolves
//! the endpoint against the configured instance, attaches the token and
//! classifies the outcome:
//!
//! - 401 without a token fails with [`Error::Unauthorized`]
//! - 403 fails with [`Error::Forbidden`]
//! - 500 is logged and handed back to the caller
//! - connection problems and timeouts fail with [`Error::Connection`] and
//!   [`Error::Timeout`]
//!
//! Nothing is retried.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, error};

pub mod cache;

pub use cache::ResponseCache;

static URL_VALIDATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
        r"localhost|",
        r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$",
    ))
    .expect("URL validator regex is valid")
});

/// Returns true if `url` is acceptable as a SQUAD base URL
pub fn is_valid_url(url: &str) -> bool {
    URL_VALIDATOR.is_match(url)
}

/// Query parameters / object filters, kept sorted so they can double as
/// cache keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, String>);

impl Filters {
    pub fn new() -> Self {
        Filters(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries of `other` override entries of `self`
    pub fn merge(&mut self, other: &Filters) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Stable string form, `k1=v1&k2=v2`
    pub fn cache_key(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (key, value) in iter {
            filters.insert(key, value);
        }
        filters
    }
}

/// Request payload
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    /// `multipart/form-data`, each file sent as an `attachment` part
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<PathBuf>,
    },
    Json(serde_json::Value),
}

impl Body {
    fn apply(self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self {
            Body::Empty => request,
            Body::Form(fields) => request.form(&fields),
            Body::Multipart { fields, files } => {
                let mut form = multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key, value);
                }
                for file in files {
                    form = form.file("attachment", &file)?;
                }
                request.multipart(form)
            }
            Body::Json(value) => request.json(&value),
        })
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub url: String,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-2xx response into [`Error::Http`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Http {
                status: self.status,
                url: self.url.clone(),
                body: self.text(),
            })
        }
    }
}

/// Handle on a configured SQUAD instance
///
/// Cloning is cheap: the HTTP client and the response cache are shared.
#[derive(Clone)]
pub struct SquadApi {
    url: String,
    base: Url,
    token: Option<String>,
    client: Client,
    cache: Option<Rc<ResponseCache>>,
    max_objects: usize,
}

impl fmt::Debug for SquadApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SquadApi")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "yes"))
            .field("cache", &self.cache.is_some())
            .field("max_objects", &self.max_objects)
            .finish()
    }
}

impl SquadApi {
    /// Validate `url` and build a client for it
    pub fn configure(url: &str, token: Option<&str>) -> Result<Self> {
        Self::from_config(ClientConfig::new(url).with_token(token.map(str::to_string)))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        if !is_valid_url(&config.url) {
            return Err(Error::MalformedUrl(config.url));
        }
        config.validate()?;

        let url = if config.url.ends_with('/') {
            config.url.clone()
        } else {
            format!("{}/", config.url)
        };
        let base = Url::parse(&url).map_err(|_| Error::MalformedUrl(config.url.clone()))?;

        let client = Client::builder().timeout(config.timeout).build()?;

        let cache = if config.cache_ttl > 0 {
            debug!(
                "Caching results in \"{}\" for {} seconds",
                config.cache_path.display(),
                config.cache_ttl
            );
            let cache = ResponseCache::open(&config.cache_path, config.cache_ttl)?;
            let purged = cache.purge_expired()?;
            if purged > 0 {
                debug!("Dropped {} expired cache entries", purged);
            }
            Some(Rc::new(cache))
        } else {
            None
        };

        debug!(
            "SquadApi: url = \"{}\" and token = \"{}\"",
            url,
            if config.token.is_some() { "yes" } else { "no" }
        );

        Ok(SquadApi {
            url,
            base,
            token: config.token,
            client,
            cache,
            max_objects: config.max_objects,
        })
    }

    /// Base URL, always ending in `/`
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Ceiling applied to every paginated fetch
    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    pub fn get(&self, endpoint: &str, params: &Filters) -> Result<ApiResponse> {
        self.request(Method::GET, endpoint, params, Body::Empty)
    }

    pub fn post_form(&self, endpoint: &str, fields: Vec<(String, String)>) -> Result<ApiResponse> {
        self.request(Method::POST, endpoint, &Filters::new(), Body::Form(fields))
    }

    pub fn post_multipart(
        &self,
        endpoint: &str,
        fields: Vec<(String, String)>,
        files: Vec<PathBuf>,
    ) -> Result<ApiResponse> {
        self.request(
            Method::POST,
            endpoint,
            &Filters::new(),
            Body::Multipart { fields, files },
        )
    }

    pub fn post_json(&self, endpoint: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::POST, endpoint, &Filters::new(), Body::Json(body))
    }

    pub fn patch_json(&self, endpoint: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::PATCH, endpoint, &Filters::new(), Body::Json(body))
    }

    pub fn delete(&self, endpoint: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, endpoint, &Filters::new(), Body::Empty)
    }

    /// Version string reported by the server
    pub fn server_version(&self) -> Result<String> {
        let response = self.get("api/version/", &Filters::new())?.error_for_status()?;
        let value: serde_json::Value = match response.json() {
            Ok(value) => value,
            Err(_) => return Ok(response.text().trim().to_string()),
        };
        Ok(match value {
            serde_json::Value::String(version) => version,
            serde_json::Value::Object(map) => map
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| serde_json::Value::Object(map).to_string()),
            other => other.to_string(),
        })
    }

    /// Build the absolute URL for `endpoint`
    ///
    /// Absolute endpoints must point at the configured instance; their query
    /// string is merged over `params`.
    pub fn resolve(&self, endpoint: &str, params: &Filters) -> Result<(Url, Filters)> {
        let mut params = params.clone();

        let mut target = if endpoint.starts_with("http") {
            let parsed =
                Url::parse(endpoint).map_err(|_| Error::MalformedUrl(endpoint.to_string()))?;
            if parsed.origin() != self.base.origin() {
                return Err(Error::CrossOrigin(format!(
                    "{}/",
                    parsed.origin().ascii_serialization()
                )));
            }
            let query: Filters = parsed.query_pairs().collect();
            params.merge(&query);
            parsed
        } else {
            let path = endpoint.strip_prefix('/').unwrap_or(endpoint);
            self.base
                .join(path)
                .map_err(|_| Error::MalformedUrl(format!("{}{}", self.url, path)))?
        };

        target.set_query(None);
        target.set_fragment(None);
        Ok((target, params))
    }

    fn full_url(target: &Url, params: &Filters) -> Url {
        let mut url = target.clone();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        url
    }

    /// Issue a request and classify the outcome
    pub fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &Filters,
        body: Body,
    ) -> Result<ApiResponse> {
        let (target, params) = self.resolve(endpoint, params)?;
        let url = Self::full_url(&target, &params);
        let key = url.to_string();

        let cacheable = method == Method::GET;
        if cacheable {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&key)? {
                    debug!("{} {} (cached)", method, key);
                    return Ok(hit);
                }
            }
        }

        debug!("{} {}", method, key);

        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }
        request = body.apply(request)?;

        let response = request.send().map_err(classify)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let bytes = response.bytes().map_err(classify)?;

        match status {
            401 if !self.has_token() => return Err(Error::Unauthorized(key)),
            403 => return Err(Error::Forbidden(key)),
            500 => error!(
                "You hit a bug in SQUAD, please report it at https://github.com/Linaro/squad/issues/new so we can get it fixed."
            ),
            _ => {}
        }

        let response = ApiResponse {
            status,
            url: final_url,
            body: bytes.to_vec(),
        };

        if cacheable && response.is_success() {
            if let Some(cache) = &self.cache {
                cache.put(&key, &response)?;
            }
        }

        Ok(response)
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_connect() {
        Error::Connection(err.to_string())
    } else {
        Error::Request(err)
    }
}
