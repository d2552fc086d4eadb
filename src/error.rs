use thiserror::Error;
use std::io;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Blocking error: {0}")]
    Blocking(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Survivorship error: {0}")]
    Survivorship(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// Type alias for Result
pub type Result<T> = std::result::Result<T, Error>;

// Helper functions for common error conversions
impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn input<S: Into<String>>(msg: S) -> Self {
        Error::Input(msg.into())
    }

    pub fn blocking<S: Into<String>>(msg: S) -> Self {
        Error::Blocking(msg.into())
    }

    pub fn clustering<S: Into<String>>(msg: S) -> Self {
        Error::Clustering(msg.into())
    }

    pub fn survivorship<S: Into<String>>(msg: S) -> Self {
        Error::Survivorship(msg.into())
    }

    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Error::Execution(msg.into())
    }
}

// Implement From for common external error types
impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Input(format!("Date parse error: {}", err))
    }
}

impl From<sys_info::Error> for Error {
    fn from(err: sys_info::Error) -> Self {
        Error::Resource(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::Execution(format!("Thread pool build failed: {}", err))
    }
}
