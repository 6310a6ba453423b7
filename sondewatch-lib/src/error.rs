use std::io;
use thiserror::Error;

/// The primary error type for the `sondewatch-lib` library.
#[derive(Error, Debug)]
pub enum SondeError {
    #[error("No data: feed needs a header and at least one data row")]
    NoData,

    #[error("Timeout during feed fetch: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<figment::Error> for SondeError {
    fn from(err: figment::Error) -> Self {
        SondeError::Config(Box::new(err))
    }
}

impl SondeError {
    /// True for failures that a later attempt could plausibly fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SondeError::Timeout(_) | SondeError::Http(_) | SondeError::HttpStatus { .. } | SondeError::Io(_)
        )
    }
}
