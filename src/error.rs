use thiserror::Error;

use crate::models::{ChapterId, ComicId};

/// Which page fetch strategy produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchKind {
    Template,
    Catalog,
    Discovery,
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Template => write!(f, "template"),
            FetchKind::Catalog => write!(f, "catalog"),
            FetchKind::Discovery => write!(f, "discovery"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GrabberError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to create chapter {number}: {message}")]
    ChapterCreationFailed { number: f64, message: String },

    #[error("{kind} fetch failed: {message}")]
    FetchFailed { kind: FetchKind, message: String },

    #[error("Chapter {0} has no external chapter id")]
    NotEligible(ChapterId),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("A grab run is already in progress for comic {0}")]
    AlreadyRunning(ComicId),

    #[error("External catalog error: {0}")]
    Catalog(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Comic not found: {0}")]
    ComicNotFound(ComicId),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(ChapterId),
}

impl GrabberError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn chapter_creation(number: f64, msg: impl Into<String>) -> Self {
        Self::ChapterCreationFailed {
            number,
            message: msg.into(),
        }
    }

    pub fn fetch_failed(kind: FetchKind, msg: impl Into<String>) -> Self {
        Self::FetchFailed {
            kind,
            message: msg.into(),
        }
    }

    pub fn not_available(msg: impl Into<String>) -> Self {
        Self::NotAvailable(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn scraping(msg: impl Into<String>) -> Self {
        Self::Scraping(msg.into())
    }

    /// Folds a backend error into a `FetchFailed` of `kind`. Errors that already name
    /// the failing chapter or input are kept as they are.
    pub fn into_fetch_failure(self, kind: FetchKind) -> Self {
        match self {
            Self::FetchFailed { .. }
            | Self::NotEligible(_)
            | Self::Validation(_)
            | Self::ChapterNotFound(_)
            | Self::ComicNotFound(_)
            | Self::NotAvailable(_) => self,
            other => Self::fetch_failed(kind, other.to_string()),
        }
    }

    /// True for failures raised before any external call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, GrabberError>;
