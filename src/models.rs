use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

pub type ComicId = i64;
pub type ChapterId = i64;
pub type PageId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comic {
    pub id: ComicId,
    pub title: String,
    pub status: ComicStatus,
    pub synopsis: String,
    pub genres: Json<Vec<String>>,
    pub is_explicit: bool,
    pub cover_blob_id: Option<String>,
    pub source_type: SourceType,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Chapter {
    pub id: ChapterId,
    pub comic_id: ComicId,
    pub number: f64,
    pub title: String,
    pub external_chapter_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Page {
    pub id: PageId,
    pub chapter_id: ChapterId,
    pub page_number: i64,
    pub blob_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComicStatus {
    Ongoing,
    Completed,
    Hiatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Manual,
    ExternalCatalog,
}

/// Comic metadata as delivered by an external catalog, before it gets an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComic {
    pub title: String,
    pub status: ComicStatus,
    pub synopsis: String,
    pub genres: Vec<String>,
    pub is_explicit: bool,
    pub cover_blob_id: Option<String>,
    pub source_type: SourceType,
}

/// One entry of an external catalog's chapter list.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogChapter {
    pub external_id: String,
    pub number: f64,
    pub title: String,
}

impl Chapter {
    /// A chapter can be grabbed from the external catalog only with a non-empty external id.
    pub fn external_id(&self) -> Option<&str> {
        self.external_chapter_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn number_label(&self) -> String {
        format_chapter_number(self.number)
    }
}

/// Whole chapter numbers print without a fractional part ("12", not "12.0").
pub fn format_chapter_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

/// Chapter numbers are floats; two numbers within this distance are the same chapter.
pub const CHAPTER_NUMBER_EPSILON: f64 = 0.001;

pub fn same_chapter_number(a: f64, b: f64) -> bool {
    (a - b).abs() < CHAPTER_NUMBER_EPSILON
}

impl std::fmt::Display for ComicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComicStatus::Ongoing => write!(f, "ongoing"),
            ComicStatus::Completed => write!(f, "completed"),
            ComicStatus::Hiatus => write!(f, "hiatus"),
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Manual => write!(f, "manual"),
            SourceType::ExternalCatalog => write!(f, "external_catalog"),
        }
    }
}
