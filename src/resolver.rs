use chrono::Utc;
use tracing::debug;

use crate::error::{GrabberError, Result};
use crate::models::{same_chapter_number, Chapter, ChapterId, ComicId};
use crate::traits::ComicBackend;

/// Find-or-create for chapters, keyed by `(comic_id, chapter_number)`.
///
/// This is the pipeline's only idempotency mechanism. There is no lock: calls within a
/// run are sequential, and concurrent runs on one comic are refused by the orchestrator.
pub struct ChapterResolver<'a> {
    backend: &'a dyn ComicBackend,
}

impl<'a> ChapterResolver<'a> {
    pub fn new(backend: &'a dyn ComicBackend) -> Self {
        Self { backend }
    }

    pub async fn resolve_chapter(&self, comic_id: ComicId, chapter_number: f64, title: &str) -> Result<ChapterId> {
        Ok(self.resolve(comic_id, chapter_number, title).await?.id)
    }

    /// Returns the stored chapter with this number, or creates one. An existing
    /// chapter's title is left untouched so catalog-sourced titles survive.
    pub async fn resolve(&self, comic_id: ComicId, chapter_number: f64, title: &str) -> Result<Chapter> {
        let existing = self
            .backend
            .list_chapters_by_comic(comic_id)
            .await
            .map_err(|e| GrabberError::chapter_creation(chapter_number, e.to_string()))?;

        if let Some(chapter) = existing
            .into_iter()
            .find(|c| same_chapter_number(c.number, chapter_number))
        {
            debug!("Chapter {} already exists (id {})", chapter_number, chapter.id);
            return Ok(chapter);
        }

        let id = self
            .backend
            .create_chapter(comic_id, chapter_number, title)
            .await
            .map_err(|e| GrabberError::chapter_creation(chapter_number, e.to_string()))?;
        debug!("Chapter {} created (id {})", chapter_number, id);

        Ok(Chapter {
            id,
            comic_id,
            number: chapter_number,
            title: title.to_string(),
            external_chapter_id: None,
            created_at: Utc::now(),
        })
    }
}
