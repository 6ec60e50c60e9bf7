use tracing::info;

use crate::error::{FetchKind, GrabberError, Result};
use crate::models::{Chapter, ComicId};
use crate::traits::{ComicBackend, PageFetchStrategy};

/// Pulls the authoritative page list for a chapter tagged with an external chapter id.
pub struct ExternalCatalogGrab;

#[async_trait::async_trait]
impl PageFetchStrategy for ExternalCatalogGrab {
    fn kind(&self) -> FetchKind {
        FetchKind::Catalog
    }

    fn is_eligible(&self, chapter: &Chapter) -> bool {
        chapter.external_id().is_some()
    }

    async fn fetch(&self, backend: &dyn ComicBackend, _comic_id: ComicId, chapter: &Chapter) -> Result<()> {
        let external_id = chapter
            .external_id()
            .ok_or(GrabberError::NotEligible(chapter.id))?;
        info!("[CATALOG] Chapter {}: fetching pages for {}", chapter.number_label(), external_id);

        backend
            .fetch_pages_from_external_catalog(chapter.id)
            .await
            .map_err(|e| e.into_fetch_failure(self.kind()))
    }
}
