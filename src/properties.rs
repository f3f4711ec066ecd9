// String-keyed configuration properties
// Loaded from application-test.yaml with nested keys flattened to dotted form

use crate::errors::{DbStageError, Result};
use regex::Regex;
use serde_yml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const PLATFORM: &str = "ebean.test.platform";
pub const DB_NAME: &str = "ebean.test.dbName";
pub const DEBUG: &str = "ebean.test.debug";
pub const USE_DOCKER: &str = "ebean.test.useDocker";
/// Comma separated extra databases created in the primary container
pub const EXTRA_DB: &str = "ebean.test.extraDb";

/// Candidate file names, first match wins
const CONFIG_FILES: [&str; 2] = ["application-test.yaml", "application-test.yml"];

/// Ordered string map of configuration properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load properties from the first test config file found in `dir`
    ///
    /// A missing file yields empty properties, the same way an absent
    /// config is treated as defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        match Self::find_config_file(dir) {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and flatten a specific YAML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: Value = serde_yml::from_str(content)?;
        let mut props = Self::default();

        match value {
            Value::Null => {}
            Value::Mapping(_) => flatten_into(&mut props.entries, "", &value),
            _ => {
                return Err(DbStageError::Config(
                    "Test configuration must be a YAML mapping".to_string(),
                ))
            }
        }

        Ok(props)
    }

    fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value with surrounding whitespace removed, empty treated as absent
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_trimmed(key).unwrap_or(default)
    }

    /// Case-insensitive "true" check; anything else is false
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Like `is_true`, but an absent key yields `default`
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        match self.get_trimmed(key) {
            Some(v) => v.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Apply `key=value` overrides on top of the loaded values
    pub fn apply_overrides<S: AsRef<str>>(&mut self, overrides: &[S]) -> Result<()> {
        for raw in overrides {
            let (key, value) = parse_override(raw.as_ref())?;
            self.set(key, value);
        }
        Ok(())
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

fn override_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9_.\-]+)\s*=(.*)$").expect("override pattern is valid")
    })
}

/// Parse a single "key=value" override
fn parse_override(raw: &str) -> Result<(String, String)> {
    let caps = override_pattern().captures(raw).ok_or_else(|| {
        DbStageError::Config(format!(
            "Invalid override '{}'. Expected 'key=value'",
            raw
        ))
    })?;

    Ok((caps[1].to_string(), caps[2].trim().to_string()))
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: &str, value: &Value) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let Some(key) = scalar_to_string(k) else {
                    continue;
                };
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(out, &full, v);
            }
        }
        Value::Sequence(items) => {
            let joined = items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        Value::Tagged(tagged) => flatten_into(out, prefix, &tagged.value),
        Value::Null => {}
        scalar => {
            if let Some(s) = scalar_to_string(scalar) {
                out.insert(prefix.to_string(), s);
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
