use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DashError {
    #[error("invalid {component} component: {value:?}")]
    InvalidComponent {
        component: &'static str,
        value: String,
    },

    #[error("invalid source key: {0}")]
    InvalidSourceKey(String),

    #[error("malformed catalogue entry at {path}: {reason}")]
    CatalogueParse { path: String, reason: String },

    #[error("failed to load catalogue: {0}")]
    #[diagnostic(help("check the catalogue location in ghg-dashboard.json"))]
    CatalogueLoad(String),

    #[error("unknown source key: {0}")]
    UnknownSourceKey(String),

    #[error("payload request failed: {0}")]
    FetchHttp(String),

    #[error("payload server returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("invalid payload: {0}")]
    PayloadParse(String),

    #[error("invalid defaults document: {0}")]
    DefaultsConfig(String),

    #[error("failed to load species labels: {0}")]
    LabelsLoad(String),

    #[error("missing config file ghg-dashboard.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DashError {
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            DashError::FetchHttp(_) | DashError::FetchStatus { .. } | DashError::PayloadParse(_)
        )
    }
}
