use crate::error::{FetchKind, Result};
use crate::models::{CatalogChapter, Chapter, ChapterId, ComicId, NewComic, Page, PageId};

/// The content store plus the acquisition calls the pipeline drives. Every method is
/// a single request/response unit; nothing here holds a transaction across calls.
#[async_trait::async_trait]
pub trait ComicBackend: Send + Sync {
    /// False while the backend connection is not usable.
    async fn is_ready(&self) -> bool {
        true
    }

    async fn create_chapter(&self, comic_id: ComicId, chapter_number: f64, title: &str) -> Result<ChapterId>;

    async fn list_chapters_by_comic(&self, comic_id: ComicId) -> Result<Vec<Chapter>>;

    async fn add_page(&self, chapter_id: ChapterId, page_number: i64, asset_ref: &str) -> Result<PageId>;

    async fn list_pages_by_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Page>>;

    async fn import_from_external_catalog(&self, external_id: &str) -> Result<ComicId>;

    async fn fetch_chapter_list_from_external_catalog(&self, external_id: &str, comic_id: ComicId) -> Result<()>;

    async fn fetch_pages_from_external_catalog(&self, chapter_id: ChapterId) -> Result<()>;

    /// `url_template` has its chapter placeholder already filled; only `{page}` remains.
    async fn fetch_pages_by_template(
        &self,
        comic_id: ComicId,
        chapter_id: ChapterId,
        url_template: &str,
        page_start: u32,
        page_end: u32,
    ) -> Result<()>;

    async fn fetch_pages_by_discovery(&self, comic_id: ComicId, chapter_id: ChapterId, chapter_url: &str) -> Result<()>;
}

/// Read side of an external metadata catalog.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_comic(&self, external_id: &str) -> Result<NewComic>;

    /// Chapters in ascending number order, one entry per number.
    async fn fetch_chapter_list(&self, external_id: &str) -> Result<Vec<CatalogChapter>>;

    /// Page asset URLs in reading order.
    async fn fetch_page_urls(&self, external_chapter_id: &str) -> Result<Vec<String>>;
}

/// Finds the page images of a chapter given only its URL.
#[async_trait::async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract_pages(&self, chapter_url: &str) -> Result<Vec<String>>;
}

/// One way of populating the pages of an already-resolved chapter.
#[async_trait::async_trait]
pub trait PageFetchStrategy: Send + Sync {
    fn kind(&self) -> FetchKind;

    /// Input checks that must pass before a run touches any external system.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Whether a pre-fetched chapter belongs in a "grab all" target set.
    fn is_eligible(&self, _chapter: &Chapter) -> bool {
        true
    }

    async fn fetch(&self, backend: &dyn ComicBackend, comic_id: ComicId, chapter: &Chapter) -> Result<()>;
}
