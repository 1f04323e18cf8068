//! Error types for MountCockpit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CockpitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Share registry error: {0}")]
    Registry(String),

    #[error("Cockpit task has shut down")]
    Shutdown,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CockpitError>;
