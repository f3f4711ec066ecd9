use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbStageError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Setup of platform '{platform}' failed: {message}")]
    Setup { platform: String, message: String },

    #[error("Search index setup failed: {0}")]
    IndexSetup(String),

    #[error("Docker error: {0}")]
    Docker(String),

    #[error("The {0} setup branch panicked")]
    BranchPanicked(&'static str),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbStageError>;
