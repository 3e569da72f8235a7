use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PlanetError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned status {status}")]
    Remote { url: String, status: u16 },

    #[error("{0}")]
    Parse(String),

    #[error("mirrors disagree: {0}")]
    #[diagnostic(help("re-run later, the mirrors are probably mid-sync"))]
    Consistency(String),

    #[error("catalog data error: {0}")]
    Data(String),

    #[error("no usable sources found on any mirror")]
    #[diagnostic(help("run with --verbose to see why each mirror was rejected"))]
    NoSources,

    #[error("area not found: {query}")]
    #[diagnostic(help("{suggestions}"))]
    AreaNotFound { query: String, suggestions: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid mirror: {0}")]
    InvalidMirror(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    #[diagnostic(help("install aria2 (https://aria2.github.io/) and make sure it is on PATH"))]
    MissingTool(String),

    #[error("downloader failed: {0}")]
    Downloader(String),
}

impl PlanetError {
    pub(crate) fn http(url: &str, err: impl ToString) -> Self {
        PlanetError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
