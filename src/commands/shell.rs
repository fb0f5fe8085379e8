//! Query SQUAD line by line
//!
//! Each line names an entity type followed by `key=value` filters, e.g.
//!
//! ```text
//! Build count=5 project__slug=linux-next ordering=-id
//! ```
//!
//! Matching objects are printed as JSON. `count=all` follows pagination to
//! the end. Lines come from a script file or from stdin; `help` lists the
//! types and `quit` stops reading.

use super::{Command, FAILURE, SUCCESS};
use crate::api::{Filters, SquadApi};
use crate::error::{Error, Result};
use crate::models::squad::TYPE_NAMES;
use crate::models::{Count, Squad};
use crate::ui::UI;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// One parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Help,
    Quit,
    Fetch {
        type_name: String,
        count: Count,
        filters: Filters,
    },
}

impl Query {
    /// Parse a non-empty line
    pub fn parse(line: &str) -> Result<Query> {
        let mut tokens = line.split_whitespace();
        let type_name = match tokens.next() {
            Some("help") | Some("?") => return Ok(Query::Help),
            Some("quit") | Some("exit") => return Ok(Query::Quit),
            Some(type_name) => type_name.to_string(),
            None => return Err(Error::Parse("Empty query".to_string())),
        };

        let mut count = Count::DEFAULT;
        let mut filters = Filters::new();
        for token in tokens {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                Error::Parse(format!("Expected key=value, got \"{}\"", token))
            })?;
            if key == "count" {
                count = Count::parse(value)
                    .ok_or_else(|| Error::Parse(format!("Invalid count \"{}\"", value)))?;
            } else {
                filters.insert(key, value);
            }
        }

        Ok(Query::Fetch {
            type_name,
            count,
            filters,
        })
    }
}

pub struct ShellCommand {
    api: SquadApi,
    script: Option<PathBuf>,
}

impl ShellCommand {
    /// Read queries from `script`, or from stdin when `None`
    pub fn new(api: SquadApi, script: Option<PathBuf>) -> Self {
        ShellCommand { api, script }
    }

    fn run(&self, input: &mut dyn BufRead, ui: &mut dyn UI) -> Result<i32> {
        let squad = Squad::new(self.api.clone());
        let mut code = SUCCESS;

        for (number, line) in input.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            debug!("shell:{}: {}", number + 1, line);

            let query = match Query::parse(line) {
                Ok(query) => query,
                Err(e) => {
                    ui.error(&format!("line {}: {}", number + 1, e))?;
                    code = FAILURE;
                    continue;
                }
            };

            match query {
                Query::Quit => break,
                Query::Help => {
                    ui.output("Usage: <Type> [count=N|all] [key=value ...]")?;
                    ui.output(&format!("Types: {}", TYPE_NAMES.join(", ")))?;
                }
                Query::Fetch {
                    type_name,
                    count,
                    filters,
                } => match squad.fetch_type(&type_name, &filters, count) {
                    Ok(objects) => ui.output(&serde_json::to_string_pretty(&objects)?)?,
                    Err(e @ Error::InvalidObjectType(_)) => {
                        ui.error(&format!("line {}: {}", number + 1, e))?;
                        code = FAILURE;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        Ok(code)
    }
}

impl Command for ShellCommand {
    fn execute(&self, ui: &mut dyn UI) -> Result<i32> {
        match &self.script {
            Some(path) => {
                let file = File::open(path).map_err(|e| Error::InputFile {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                self.run(&mut BufReader::new(file), ui)
            }
            None => self.run(&mut io::stdin().lock(), ui),
        }
    }

    fn name(&self) -> &str {
        "shell"
    }

    fn help(&self) -> &str {
        "query SQUAD objects from a script or stdin"
    }
}
