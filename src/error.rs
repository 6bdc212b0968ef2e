use std::path::PathBuf;
use thiserror::Error;

/// Failures reading, editing or writing a `.docx` package.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("package has no part named {0}")]
    MissingPart(String),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Request problems detected before any template is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is {size} bytes, the limit is {limit} bytes")]
    UploadTooLarge {
        field: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("{field} has unsupported type '{found}' (allowed: {allowed})")]
    UnsupportedImageType {
        field: &'static str,
        found: String,
        allowed: String,
    },

    #[error("unknown {kind} '{id}'")]
    UnknownSelection { kind: &'static str, id: String },
}

/// Failures reading or appending the submission history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace history file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Failures writing the results of a successful assembly.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocxError,
    },

    #[error("failed to record submission: {0}")]
    History(#[from] HistoryError),
}

/// Everything that stops a proposal from being produced.
///
/// Fragments that fail to load are not represented here: they are reported
/// next to the finished document instead.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to load master template {path}: {source}")]
    MasterLoad {
        path: PathBuf,
        #[source]
        source: DocxError,
    },

    #[error("failed to place image at '{token}' in master template: {source}")]
    MasterImage {
        token: String,
        #[source]
        source: DocxError,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ProposalError {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_validation(&self) -> bool {
        matches!(self, ProposalError::Validation(_))
    }
}

/// Failures loading the TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
