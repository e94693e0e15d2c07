use std::path::PathBuf;

/// Errors raised while assembling or writing a generated project.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Two steps declared the same state field with different types.
    #[error("state field '{name}' declared as both '{first}' and '{second}'")]
    ConflictingField {
        name: String,
        first: String,
        second: String,
    },

    #[error("failed to write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Config(#[from] serde_json::Error),
}
