use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonDbError {
    #[error("Table not found: {id}")]
    TableNotFound { id: String },

    #[error("Unknown table key: {key}")]
    UnknownTable { key: String },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document shape error: {0}")]
    Shape(String),

    #[error("Invalid entry id for array document: {id}")]
    InvalidEntryId { id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JsonDbError>;
