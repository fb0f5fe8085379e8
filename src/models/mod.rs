//! Typed SQUAD entities
//!
//! Each REST resource is an explicit struct whose fields are the wire fields
//! it accepts. All fields are optional and unset fields are never serialized;
//! fields the server sends that a struct does not declare are dropped.
//!
//! Relations to other resources are [`Link`]s: a URL as delivered by the
//! server, resolved with one GET the first time [`Link::resolve`] is called
//! and memoized on the link afterwards.

use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use once_cell::unsync::OnceCell;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

mod auxiliary;
mod build;
mod environment;
pub mod fetch;
mod group;
mod project;
mod results;
pub mod squad;
pub mod submit;
mod testjob;
mod testrun;

pub use auxiliary::{Annotation, Backend, EmailTemplate, KnownIssue, MetricThreshold, Report, SuiteMetadata};
pub use build::{Build, BuildStatus};
pub use environment::Environment;
pub use fetch::{fetch, Count};
pub use group::Group;
pub use project::Project;
pub use results::{Metric, Suite, Test};
pub use squad::Squad;
pub use testjob::TestJob;
pub use testrun::{SuiteBucket, TestRun, TestRunStatus};

/// Process-local identity for objects that have not been saved yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub Uuid);

impl Default for LocalId {
    fn default() -> Self {
        LocalId(Uuid::new_v4())
    }
}

/// Key of an object inside an [`Objects`] map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectId {
    /// Assigned by the server
    Server(u64),
    /// Synthetic, for objects built client-side
    Local(Uuid),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Server(id) => write!(f, "{}", id),
            ObjectId::Local(uuid) => write!(f, "{}", uuid),
        }
    }
}

/// Anything that comes back from a paginated listing
pub trait Record: DeserializeOwned + Serialize + Clone + fmt::Debug {
    const TYPE_NAME: &'static str;

    fn id(&self) -> Option<u64>;

    fn local_id(&self) -> Uuid;

    fn object_id(&self) -> ObjectId {
        match self.id() {
            Some(id) => ObjectId::Server(id),
            None => ObjectId::Local(self.local_id()),
        }
    }
}

/// A resource with its own REST endpoint
pub trait SquadObject: Record {
    /// Listing endpoint, e.g. `/api/groups/`
    const ENDPOINT: &'static str;

    /// API URL of this object, when the server told us
    fn url(&self) -> Option<&str>;

    /// Hook run before every save
    fn pre_save(&mut self) {}

    /// Path of the detail endpoint, if the object has a server id
    fn detail_path(&self) -> Option<String> {
        self.id().map(|id| format!("{}{}/", Self::ENDPOINT, id))
    }

    /// Create (no server id) or update the object, then refresh it from the
    /// server response
    fn save(&mut self, api: &SquadApi) -> Result<()> {
        self.pre_save();

        let body = serde_json::to_value(&*self)?;
        let response = match self.detail_path() {
            Some(path) => api.patch_json(&path, body)?,
            None => api.post_json(Self::ENDPOINT, body)?,
        };

        if matches!(response.status, 400 | 401 | 405) {
            return Err(Error::SaveFailed {
                kind: Self::TYPE_NAME.to_string(),
                reason: response.text(),
            });
        }

        *self = response.error_for_status()?.json()?;
        Ok(())
    }

    fn delete(&self, api: &SquadApi) -> Result<()> {
        let path = self.detail_path().ok_or_else(|| {
            Error::ObjectState(format!(
                "Failed to delete {}: it must contain a valid \"id\"",
                Self::TYPE_NAME
            ))
        })?;

        let response = api.delete(&path)?;
        if matches!(response.status, 400 | 401 | 405) {
            return Err(Error::DeleteFailed {
                kind: Self::TYPE_NAME.to_string(),
                reason: response.text(),
            });
        }
        response.error_for_status()?;
        Ok(())
    }
}

macro_rules! squad_object {
    (@record $ty:ident, $name:literal) => {
        impl $crate::models::Record for $ty {
            const TYPE_NAME: &'static str = $name;

            fn id(&self) -> Option<u64> {
                self.id
            }

            fn local_id(&self) -> uuid::Uuid {
                self.local_id.0
            }
        }
    };
    ($ty:ident, $name:literal, $endpoint:literal) => {
        squad_object!(@record $ty, $name);

        impl $crate::models::SquadObject for $ty {
            const ENDPOINT: &'static str = $endpoint;

            fn url(&self) -> Option<&str> {
                self.url.as_deref()
            }
        }
    };
    ($ty:ident, $name:literal, $endpoint:literal, pre_save = $hook:ident) => {
        squad_object!(@record $ty, $name);

        impl $crate::models::SquadObject for $ty {
            const ENDPOINT: &'static str = $endpoint;

            fn url(&self) -> Option<&str> {
                self.url.as_deref()
            }

            fn pre_save(&mut self) {
                self.$hook()
            }
        }
    };
}

pub(crate) use squad_object;

/// Insertion-ordered map of objects keyed by [`ObjectId`]
///
/// Inserting an object whose id is already present replaces it in place.
#[derive(Debug, Clone)]
pub struct Objects<T> {
    items: Vec<T>,
    index: HashMap<ObjectId, usize>,
}

impl<T> Default for Objects<T> {
    fn default() -> Self {
        Objects {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Objects<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the object previously stored under the same id
    pub fn insert(&mut self, object: T) -> Option<T> {
        let key = object.object_id();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.items[position], object)),
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(object);
                None
            }
        }
    }

    pub fn contains(&self, key: &ObjectId) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &ObjectId) -> Option<&T> {
        self.index.get(key).map(|&position| &self.items[position])
    }

    pub fn get_mut(&mut self, key: &ObjectId) -> Option<&mut T> {
        match self.index.get(key) {
            Some(&position) => self.items.get_mut(position),
            None => None,
        }
    }

    /// Lookup by server id
    pub fn by_id(&self, id: u64) -> Option<&T> {
        self.get(&ObjectId::Server(id))
    }

    pub fn keys(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.items.iter().map(Record::object_id)
    }
}

impl<T> Objects<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn values(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn values_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn into_values(self) -> Vec<T> {
        self.items
    }

    pub fn into_first(self) -> Option<T> {
        self.items.into_iter().next()
    }
}

impl<T: Record> FromIterator<T> for Objects<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut objects = Objects::new();
        for object in iter {
            objects.insert(object);
        }
        objects
    }
}

impl<T> IntoIterator for Objects<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Objects<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Serialize> Serialize for Objects<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

/// Per-instance memo of fetched collections, keyed by filter string
#[derive(Debug)]
pub struct FilterCache<T>(RefCell<HashMap<String, Objects<T>>>);

impl<T> Default for FilterCache<T> {
    fn default() -> Self {
        FilterCache(RefCell::new(HashMap::new()))
    }
}

impl<T: Clone> Clone for FilterCache<T> {
    fn clone(&self) -> Self {
        FilterCache(RefCell::new(self.0.borrow().clone()))
    }
}

impl<T: Record> FilterCache<T> {
    /// Return the memoized collection for `key`, fetching it on a miss
    pub fn get_or_try_insert<F>(&self, key: String, fetch: F) -> Result<Objects<T>>
    where
        F: FnOnce() -> Result<Objects<T>>,
    {
        if let Some(objects) = self.0.borrow().get(&key) {
            return Ok(objects.clone());
        }
        let objects = fetch()?;
        self.0.borrow_mut().insert(key, objects.clone());
        Ok(objects)
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Cache key combining filters and count
pub(crate) fn cache_key(filters: &Filters, count: Count) -> String {
    format!("{}|{}", filters.cache_key(), count)
}

/// Relation to another object
///
/// Holds the URL the server sent, the object itself, or both once resolved.
#[derive(Debug, Clone)]
pub struct Link<T> {
    url: Option<String>,
    object: OnceCell<T>,
}

impl<T> Link<T> {
    pub fn from_url(url: impl Into<String>) -> Self {
        Link {
            url: Some(url.into()),
            object: OnceCell::new(),
        }
    }

    pub fn from_object(object: T) -> Self {
        Link {
            url: None,
            object: OnceCell::from(object),
        }
    }

    /// The object, if already resolved or built client-side
    pub fn get(&self) -> Option<&T> {
        self.object.get()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.object.get_mut()
    }

    /// The URL as received, without looking at the object
    pub fn raw_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl<T: SquadObject> Link<T> {
    /// URL of the target: the received one, otherwise the object's own
    pub fn url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let object = self.object.get()?;
        object
            .url()
            .map(str::to_string)
            .or_else(|| object.detail_path())
    }

    /// Server id of the target, read from the trailing URL segment when the
    /// object has not been resolved
    pub fn id(&self) -> Option<u64> {
        if let Some(id) = self.object.get().and_then(Record::id) {
            return Some(id);
        }
        self.url.as_deref().and_then(id_from_url)
    }

    /// Fetch the target on first access
    pub fn resolve(&self, api: &SquadApi) -> Result<&T> {
        self.object.get_or_try_init(|| match &self.url {
            Some(url) => retrieve_url(api, url),
            None => Err(Error::InvalidLookup(format!(
                "{} relation has neither url nor object",
                T::TYPE_NAME
            ))),
        })
    }
}

impl<T: SquadObject> Serialize for Link<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.url() {
            Some(url) => serializer.serialize_str(&url),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de, T: SquadObject> Deserialize<'de> for Link<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(url) => Ok(Link::from_url(url)),
            serde_json::Value::Number(id) => id
                .as_u64()
                .map(|id| Link::from_url(format!("{}{}/", T::ENDPOINT, id)))
                .ok_or_else(|| D::Error::custom("relation id must be a positive integer")),
            value @ serde_json::Value::Object(_) => {
                let url = value.get("url").and_then(|u| u.as_str()).map(str::to_string);
                let object: T = serde_json::from_value(value).map_err(D::Error::custom)?;
                let mut link = Link::from_object(object);
                link.url = url;
                Ok(link)
            }
            other => Err(D::Error::custom(format!(
                "expected a {} url, got {}",
                T::TYPE_NAME,
                other
            ))),
        }
    }
}

/// Trailing numeric segment of an API URL, e.g. `.../api/builds/12/` gives 12
pub fn id_from_url(url: &str) -> Option<u64> {
    url.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// GET a single object through its API URL
pub fn retrieve_url<T: DeserializeOwned>(api: &SquadApi, url: &str) -> Result<T> {
    api.get(url, &Filters::new())?.error_for_status()?.json()
}

/// GET a single object through its detail endpoint
pub fn retrieve<T: SquadObject>(api: &SquadApi, id: u64) -> Result<T> {
    retrieve_url(api, &format!("{}{}/", T::ENDPOINT, id))
}

/// Look an object up by id through its listing endpoint
pub fn get<T: SquadObject>(api: &SquadApi, id: u64) -> Result<Option<T>> {
    let filters = Filters::new().with("id", id);
    Ok(fetch::<T>(api, T::ENDPOINT, &filters, Count::Limit(1))?.into_first())
}

/// Split `suite/name` into its suite and the rest. Names without a slash
/// belong to the unnamed suite.
pub fn parse_test_name(name: &str) -> (&str, &str) {
    name.split_once('/').unwrap_or(("", name))
}
