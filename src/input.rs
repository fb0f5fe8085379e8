//! Loading of user supplied files: results, metrics, metadata, logs,
//! attachments and job definitions

use crate::config::MAX_FILE_SIZE;
use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

/// The file must exist and be no larger than [`MAX_FILE_SIZE`]
pub fn check_file(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|_| Error::InputFile {
        path: path.to_path_buf(),
        reason: "file does not exist".to_string(),
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(Error::InputFile {
            path: path.to_path_buf(),
            reason: "file too big".to_string(),
        });
    }

    Ok(())
}

/// Read a size-checked text file
pub fn read_text_file(path: &Path) -> Result<String> {
    check_file(path)?;
    Ok(fs::read_to_string(path)?)
}

/// Parse a `.json`, `.yml` or `.yaml` file into a JSON value
pub fn read_input_file(path: &Path) -> Result<Value> {
    check_file(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let content = fs::read_to_string(path)?;
    match extension {
        "json" => serde_json::from_str(&content).map_err(|e| Error::Parse(format!(
            "Failed parsing file \"{}\": {}",
            path.display(),
            e
        ))),
        "yml" | "yaml" => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
                Error::Parse(format!("Failed parsing file \"{}\": {}", path.display(), e))
            })?;
            yaml_to_json(yaml)
        }
        _ => Err(Error::InputFile {
            path: path.to_path_buf(),
            reason: "does not have a JSON or YAML file extension".to_string(),
        }),
    }
}

/// Convert YAML to JSON, rejecting mappings with non-string keys
pub fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(key) => key,
                    _ => return Err(Error::Validation("Non-string key detected".to_string())),
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}
