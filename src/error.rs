use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to retrieve {0}")]
    Unavailable(String),

    #[error("Ratings service error: {0}")]
    Ratings(String),

    #[error("Enrollment request rejected for {0}")]
    EnrollmentRejected(String),

    #[error("No course mapping snapshots found in {0}")]
    NoSnapshots(PathBuf),

    #[error("Merging requires two or more snapshots, found {0}")]
    NotEnoughSnapshots(usize),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
