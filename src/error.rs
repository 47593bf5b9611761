use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid page URL: {0}")]
    InvalidUrl(String),

    #[error("invalid configuration at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("invalid image selection: {0}")]
    InvalidSelection(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("page {url} returned HTTP {status}")]
    PageStatus { url: String, status: u16 },

    #[error("page {url} is not an HTML document (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("refusing to write unsafe file name: {0}")]
    UnsafeFileName(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
