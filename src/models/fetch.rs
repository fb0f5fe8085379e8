//! Paginated listings
//!
//! SQUAD wraps listings in `{"next": ..., "results": [...]}`. [`fetch`]
//! follows `next` until it has as many objects as asked for or the server
//! runs out of pages.

use super::{Objects, Record};
use crate::api::{Filters, SquadApi};
use crate::config::{DEFAULT_NUM_OF_OBJECTS, SQUAD_MAX_PAGE_LIMIT};
use crate::error::Result;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

/// How many objects a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// Follow pagination up to the configured ceiling
    All,
    Limit(usize),
}

impl Count {
    pub const DEFAULT: Count = Count::Limit(DEFAULT_NUM_OF_OBJECTS);

    /// Parse the CLI/shell form, where `-1` and `all` mean [`Count::All`]
    pub fn parse(value: &str) -> Option<Count> {
        match value {
            "all" | "ALL" | "-1" => Some(Count::All),
            other => other.parse().ok().map(Count::Limit),
        }
    }
}

impl Default for Count {
    fn default() -> Self {
        Count::DEFAULT
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::All => write!(f, "all"),
            Count::Limit(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: Record")]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Fetch up to `count` objects of type `T` from `endpoint`
pub fn fetch<T: Record>(
    api: &SquadApi,
    endpoint: &str,
    filters: &Filters,
    count: Count,
) -> Result<Objects<T>> {
    let ceiling = api.max_objects();
    let wanted = match count {
        Count::All => ceiling,
        Count::Limit(n) => n,
    };

    let mut filters = filters.clone();
    filters.insert("limit", wanted.min(SQUAD_MAX_PAGE_LIMIT));

    let mut objects = Objects::new();
    let mut next = Some(endpoint.to_string());

    while let Some(url) = next.take() {
        if objects.len() >= wanted {
            break;
        }

        let page: Page<T> = api.get(&url, &filters)?.error_for_status()?.json()?;
        debug!(
            "Fetched {} {} objects from {}",
            page.results.len(),
            T::TYPE_NAME,
            url
        );

        for object in page.results {
            if objects.len() >= wanted {
                break;
            }
            objects.insert(object);
        }
        next = page.next;
    }

    if objects.len() >= ceiling {
        warn!("Maximum number of objects reached [{}]!", objects.len());
    }

    Ok(objects)
}
