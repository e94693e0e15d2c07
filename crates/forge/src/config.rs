//! Test configuration loading.
//!
//! The configuration is opaque to the pipeline apart from its
//! `expected_outputs` map. It is read from YAML, JSON or TOML by file
//! extension and held as JSON.

use std::path::Path;

use serde_json::Value;

use crate::ConfigError;

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// A loaded test configuration and the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    /// File name used when the source is copied into a project.
    pub file_name: String,
    pub source: String,
    pub value: Value,
}

impl TestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        TestConfig::parse(&file_name, &source, format)
    }

    pub fn parse(file_name: &str, source: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let value: Value = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(source)?,
            ConfigFormat::Json => serde_json::from_str(source)?,
            ConfigFormat::Toml => toml::from_str(source)?,
        };
        // An empty YAML document parses as null.
        let value = match value {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => value,
            _ => return Err(ConfigError::NotAMapping),
        };
        Ok(TestConfig {
            file_name: file_name.to_string(),
            source: source.to_string(),
            value,
        })
    }

    /// An empty mapping with no source file.
    pub fn empty() -> Self {
        TestConfig {
            file_name: stepsmith_codegen::CONFIG_FILE.to_string(),
            source: "{}\n".to_string(),
            value: Value::Object(Default::default()),
        }
    }

    /// The expected value for `key`, rendered as a string. Strings are
    /// taken as-is; other scalars use their JSON rendering.
    pub fn expected(&self, key: &str) -> Option<String> {
        self.value
            .get("expected_outputs")
            .and_then(|outputs| outputs.get(key))
            .map(render_scalar)
    }

    /// Name and contents to copy verbatim into generated projects.
    pub fn source_file(&self) -> (&str, &str) {
        (&self.file_name, &self.source)
    }
}

/// String form used when comparing expected and actual values.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
