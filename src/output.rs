//! Output serialization and subpath lookup.
//!
//! Every produced tree (ingress config, compose document, reports)
//! serializes to YAML (default), pretty JSON, or TOML, with unset fields
//! uniformly omitted by the models themselves. The pointer lookup backs
//! the HTTP subpath convention: `a/b/0` descends mappings by key and
//! sequences by index.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// YAML, the default
    #[default]
    Yaml,
    /// Pretty-printed JSON, 2-space indent
    Json,
    /// TOML
    Toml,
}

impl std::str::FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(Error::parse("format", format!("unknown format: {other}"))),
        }
    }
}

/// Serialize a value in the requested format
pub fn to_string<T: Serialize>(value: &T, format: Format) -> Result<String> {
    match format {
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| Error::yaml("output", e)),
        Format::Json => serde_json::to_string_pretty(value).map_err(|e| Error::json("output", e)),
        Format::Toml => {
            let json = serde_json::to_value(value).map_err(|e| Error::json("output", e))?;
            let toml = json_to_toml(json)?;
            toml::to_string(&toml).map_err(|e| Error::toml("output", e.to_string()))
        }
    }
}

/// Convert a JSON tree to a TOML value, dropping nulls and ordering each
/// table so plain values precede subtables
fn json_to_toml(value: Value) -> Result<toml::Value> {
    Ok(match value {
        Value::Null => toml::Value::String(String::new()),
        Value::Bool(b) => toml::Value::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                toml::Value::Integer(i)
            } else {
                toml::Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => toml::Value::String(s),
        Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(json_to_toml).collect::<Result<_>>()?)
        }
        Value::Object(map) => {
            let mut scalars = toml::map::Map::new();
            let mut tables = toml::map::Map::new();
            for (key, val) in map {
                if val.is_null() {
                    continue;
                }
                let converted = json_to_toml(val)?;
                if converted.is_table() {
                    tables.insert(key, converted);
                } else {
                    scalars.insert(key, converted);
                }
            }
            scalars.extend(tables);
            toml::Value::Table(scalars)
        }
    })
}

/// Resolve a subpath on a value tree.
///
/// Segments are separated by `/`; mappings descend by key, sequences by
/// decimal index. The empty path resolves to the tree itself.
pub fn resolve_pointer<'a>(value: &'a Value, path: &str) -> Result<&'a Value> {
    let mut current = value;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| Error::not_found(path, format!("key not found: {segment}")))?,
            Value::Array(items) => {
                let index: usize = segment.parse().map_err(|_| {
                    Error::not_found(path, format!("not a sequence index: {segment}"))
                })?;
                items.get(index).ok_or_else(|| {
                    Error::not_found(path, format!("index out of range: {segment}"))
                })?
            }
            _ => return Err(Error::not_found(path, format!("cannot descend into scalar at {segment}"))),
        };
    }
    Ok(current)
}
