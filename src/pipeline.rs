use std::sync::Arc;

use regex::Regex;
use tracing::info;

use crate::error::{GrabberError, Result};
use crate::models::{Chapter, ChapterId, ComicId};
use crate::orchestrator::{BatchOrchestrator, GrabJob, RunRegistry};
use crate::progress::{ProgressSender, RunOutcome};
use crate::strategies::ExternalCatalogGrab;
use crate::traits::ComicBackend;

const UUID_PATTERN: &str = r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

/// First UUID-shaped token in `input`, lowercased.
pub fn extract_external_id(input: &str) -> Option<String> {
    let re = Regex::new(UUID_PATTERN).ok()?;
    let token = re.find(input)?.as_str();
    uuid::Uuid::parse_str(token).ok().map(|id| id.to_string())
}

/// Accepts a bare id or a catalog URL. Falls back to the trimmed input verbatim when
/// no UUID-shaped token is present.
pub fn resolve_external_id(input: &str) -> Result<String> {
    if let Some(id) = extract_external_id(input) {
        return Ok(id);
    }
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GrabberError::validation("external catalog id is empty"));
    }
    Ok(trimmed.to_string())
}

/// Import, chapter list, then grab. Later stages expect the earlier ones to have run.
pub struct ImportPipeline {
    orchestrator: BatchOrchestrator,
}

impl ImportPipeline {
    pub fn new(backend: Arc<dyn ComicBackend>) -> Self {
        Self {
            orchestrator: BatchOrchestrator::new(backend),
        }
    }

    pub fn with_registry(backend: Arc<dyn ComicBackend>, runs: RunRegistry) -> Self {
        Self {
            orchestrator: BatchOrchestrator::with_registry(backend, runs),
        }
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    fn backend(&self) -> &dyn ComicBackend {
        self.orchestrator.backend().as_ref()
    }

    async fn ensure_ready(&self) -> Result<()> {
        if !self.backend().is_ready().await {
            return Err(GrabberError::not_available("backend connection is not ready"));
        }
        Ok(())
    }

    /// Creates a new comic from catalog metadata. Importing the same id twice creates
    /// two comics.
    pub async fn import(&self, input: &str) -> Result<ComicId> {
        let external_id = resolve_external_id(input)?;
        self.ensure_ready().await?;

        info!("[CATALOG] Importing {}", external_id);
        let comic_id = self.backend().import_from_external_catalog(&external_id).await?;
        info!("[CATALOG] Imported {} as comic {}", external_id, comic_id);
        Ok(comic_id)
    }

    /// Persists the catalog's chapter list for `comic_id` and returns the comic's
    /// chapters afterwards. Safe to re-run.
    pub async fn fetch_chapter_list(&self, input: &str, comic_id: ComicId) -> Result<Vec<Chapter>> {
        let external_id = resolve_external_id(input)?;
        self.ensure_ready().await?;

        self.backend()
            .fetch_chapter_list_from_external_catalog(&external_id, comic_id)
            .await?;
        let chapters = self.backend().list_chapters_by_comic(comic_id).await?;
        info!("[CATALOG] Comic {} now has {} chapter(s)", comic_id, chapters.len());
        Ok(chapters)
    }

    /// One-off catalog grab for a single chapter.
    pub async fn grab_chapter(&self, comic_id: ComicId, chapter_id: ChapterId) -> Result<RunOutcome> {
        self.ensure_ready().await?;

        let chapter = self
            .backend()
            .list_chapters_by_comic(comic_id)
            .await?
            .into_iter()
            .find(|c| c.id == chapter_id)
            .ok_or(GrabberError::ChapterNotFound(chapter_id))?;

        let job = GrabJob::chapters(comic_id, vec![chapter], Box::new(ExternalCatalogGrab));
        self.orchestrator.run(job, None).await
    }

    /// Catalog grab over every chapter of the comic that carries an external id.
    pub async fn grab_all(&self, comic_id: ComicId, progress: Option<ProgressSender>) -> Result<RunOutcome> {
        self.ensure_ready().await?;
        let chapters = self.backend().list_chapters_by_comic(comic_id).await?;
        self.grab_eligible(comic_id, chapters, progress).await
    }

    /// Catalog grab over the eligible subset of an already-fetched chapter list.
    /// Eligibility is judged on the given records; each chapter is re-resolved
    /// against the store before its pages are fetched.
    pub async fn grab_eligible(
        &self,
        comic_id: ComicId,
        chapters: Vec<Chapter>,
        progress: Option<ProgressSender>,
    ) -> Result<RunOutcome> {
        let job = GrabJob::all_eligible(comic_id, chapters, Box::new(ExternalCatalogGrab));
        if job.target_count() == 0 {
            return Err(GrabberError::validation(format!(
                "comic {comic_id} has no chapters with an external chapter id"
            )));
        }
        self.orchestrator.run(job, progress).await
    }
}
