use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResaleError {
    #[error("invalid collection id: {0}")]
    InvalidCollectionId(String),

    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("data.gov.sg request failed: {0}")]
    DataGovHttp(String),

    #[error("data.gov.sg returned status {status}: {message}")]
    DataGovStatus { status: u16, message: String },

    #[error("collection {0} lists no child datasets")]
    NoDatasets(u32),

    #[error("dataset {dataset_id} download not ready after {attempts} polls")]
    DownloadTimeout { dataset_id: String, attempts: usize },

    #[error("cannot coerce column {column} value {value:?}")]
    Coercion {
        column: &'static str,
        value: String,
    },

    #[error("cache archive unreadable: {0}")]
    CacheCorrupt(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("assistant request failed: {0}")]
    Assistant(String),
}
