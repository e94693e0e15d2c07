//! On-disk project layout per backend.

use std::path::{Path, PathBuf};

use stepsmith_core::Backend;

use crate::{AssembledUnit, CodegenError};

/// Name of the normalized JSON configuration every skeleton loads.
pub const CONFIG_FILE: &str = "test_config.json";

/// Inputs besides the assembled unit that a runnable project needs.
#[derive(Debug, Clone)]
pub struct ProjectInputs<'a> {
    /// File name of the feature, e.g. `calculator.feature`.
    pub feature_name: &'a str,
    pub feature_text: &'a str,
    /// The test configuration, written as [`CONFIG_FILE`].
    pub config: &'a serde_json::Value,
    /// Original configuration file name and contents, copied verbatim next
    /// to the normalized copy when present.
    pub config_source: Option<(&'a str, &'a str)>,
}

/// Directory the feature file goes in, relative to the project root.
pub fn feature_dir(backend: Backend) -> &'static str {
    match backend {
        Backend::Behave | Backend::Godog => "features",
        Backend::Cucumber => "src/test/resources/features",
    }
}

/// Directory the configuration goes in. Behave loads it relative to
/// `environment.py`, Godog relative to the package directory, Cucumber
/// from the test classpath.
pub fn config_dir(backend: Backend) -> &'static str {
    match backend {
        Backend::Behave => "features",
        Backend::Godog => "",
        Backend::Cucumber => "src/test/resources",
    }
}

/// Write the unit and its inputs under `root`. Returns every written path.
pub fn write_project(
    unit: &AssembledUnit,
    inputs: &ProjectInputs<'_>,
    root: &Path,
) -> Result<Vec<PathBuf>, CodegenError> {
    let backend = unit.backend;
    let mut files: Vec<(PathBuf, String)> = unit
        .blobs
        .iter()
        .map(|blob| (root.join(&blob.path), blob.contents.clone()))
        .collect();

    files.push((
        root.join(feature_dir(backend)).join(inputs.feature_name),
        inputs.feature_text.to_string(),
    ));

    let config_dir = root.join(config_dir(backend));
    let mut config_json = serde_json::to_string_pretty(inputs.config)?;
    config_json.push('\n');
    files.push((config_dir.join(CONFIG_FILE), config_json));
    if let Some((name, contents)) = inputs.config_source {
        if name != CONFIG_FILE {
            files.push((config_dir.join(name), contents.to_string()));
        }
    }

    files
        .into_iter()
        .map(|(path, contents)| write_file(&path, &contents))
        .collect()
}

fn write_file(path: &Path, contents: &str) -> Result<PathBuf, CodegenError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CodegenError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| CodegenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
