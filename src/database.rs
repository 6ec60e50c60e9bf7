use crate::error::{GrabberError, Result};
use crate::models::*;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        if let Some(path) = database_url.strip_prefix("sqlite:") {
            let path = std::path::Path::new(path.trim_start_matches("//"));
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !database_url.contains(":memory:") {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Database connected successfully");
        Ok(Self { pool })
    }

    pub async fn init(&self) -> Result<()> {
        info!("Initializing database schema...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'ongoing',
                synopsis TEXT NOT NULL DEFAULT '',
                genres TEXT NOT NULL DEFAULT '[]',
                is_explicit BOOLEAN NOT NULL DEFAULT 0,
                cover_blob_id TEXT,
                source_type TEXT NOT NULL DEFAULT 'manual',
                view_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chapters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                comic_id INTEGER NOT NULL,
                number REAL NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                external_chapter_id TEXT,
                created_at DATETIME NOT NULL,
                FOREIGN KEY (comic_id) REFERENCES comics (id),
                UNIQUE(comic_id, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id INTEGER NOT NULL,
                page_number INTEGER NOT NULL,
                blob_id TEXT NOT NULL,
                FOREIGN KEY (chapter_id) REFERENCES chapters (id),
                UNIQUE(chapter_id, page_number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chapters_comic_id ON chapters (comic_id, number)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pages_chapter_id ON pages (chapter_id, page_number)")
            .execute(&self.pool)
            .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.pool.is_closed()
    }

    // Comic operations
    pub async fn create_comic(&self, comic: &NewComic) -> Result<ComicId> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO comics (title, status, synopsis, genres, is_explicit, cover_blob_id, source_type, view_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&comic.title)
        .bind(comic.status)
        .bind(&comic.synopsis)
        .bind(Json(&comic.genres))
        .bind(comic.is_explicit)
        .bind(&comic.cover_blob_id)
        .bind(comic.source_type)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_comic(&self, id: ComicId) -> Result<Option<Comic>> {
        let comic = sqlx::query_as::<_, Comic>("SELECT * FROM comics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comic)
    }

    pub async fn list_comics(&self) -> Result<Vec<Comic>> {
        let comics = sqlx::query_as::<_, Comic>("SELECT * FROM comics ORDER BY updated_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(comics)
    }

    // Chapter operations
    pub async fn create_chapter(&self, comic_id: ComicId, number: f64, title: &str) -> Result<ChapterId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO chapters (comic_id, number, title, external_chapter_id, created_at)
            VALUES (?, ?, ?, NULL, ?)
            RETURNING id
            "#,
        )
        .bind(comic_id)
        .bind(number)
        .bind(title)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Inserts a chapter from an external catalog listing, or tags the existing chapter
    /// with the same number. The stored title is only replaced when it is empty.
    pub async fn upsert_catalog_chapter(&self, comic_id: ComicId, chapter: &CatalogChapter) -> Result<ChapterId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO chapters (comic_id, number, title, external_chapter_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (comic_id, number) DO UPDATE SET
                external_chapter_id = excluded.external_chapter_id,
                title = CASE WHEN chapters.title = '' THEN excluded.title ELSE chapters.title END
            RETURNING id
            "#,
        )
        .bind(comic_id)
        .bind(chapter.number)
        .bind(&chapter.title)
        .bind(&chapter.external_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>> {
        let chapter = sqlx::query_as::<_, Chapter>("SELECT * FROM chapters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chapter)
    }

    pub async fn list_chapters_by_comic(&self, comic_id: ComicId) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT * FROM chapters WHERE comic_id = ? ORDER BY number ASC",
        )
        .bind(comic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chapters)
    }

    pub async fn set_external_chapter_id(&self, chapter_id: ChapterId, external_id: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE chapters SET external_chapter_id = ? WHERE id = ?")
            .bind(external_id)
            .bind(chapter_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(GrabberError::ChapterNotFound(chapter_id));
        }
        Ok(())
    }

    // Page operations

    /// Upsert by `(chapter_id, page_number)`: grabbing the same page twice replaces
    /// its asset reference instead of adding a second page.
    pub async fn add_page(&self, chapter_id: ChapterId, page_number: i64, blob_id: &str) -> Result<PageId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO pages (chapter_id, page_number, blob_id)
            VALUES (?, ?, ?)
            ON CONFLICT (chapter_id, page_number) DO UPDATE SET blob_id = excluded.blob_id
            RETURNING id
            "#,
        )
        .bind(chapter_id)
        .bind(page_number)
        .bind(blob_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Removes every page numbered above `last_page`, returning how many were dropped.
    pub async fn delete_pages_after(&self, chapter_id: ChapterId, last_page: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM pages WHERE chapter_id = ? AND page_number > ?")
            .bind(chapter_id)
            .bind(last_page)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_pages_by_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT * FROM pages WHERE chapter_id = ? ORDER BY page_number",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(pages)
    }

    pub async fn count_pages(&self, chapter_id: ChapterId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pages WHERE chapter_id = ?")
            .bind(chapter_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
