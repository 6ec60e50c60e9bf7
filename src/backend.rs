use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::database::Database;
use crate::error::{FetchKind, GrabberError, Result};
use crate::models::{Chapter, ChapterId, ComicId, NewComic, Page, PageId, SourceType};
use crate::registry::ExtractorRegistry;
use crate::sources::MangaDexSource;
use crate::template::{expand_page, PAGE_PLACEHOLDER};
use crate::traits::{CatalogSource, ComicBackend, PageExtractor};

/// The content store plus the external sources, wired together.
pub struct LocalBackend {
    db: Database,
    catalog: Arc<dyn CatalogSource>,
    extractor: Arc<dyn PageExtractor>,
}

impl LocalBackend {
    pub fn new(db: Database, catalog: Arc<dyn CatalogSource>, extractor: Arc<dyn PageExtractor>) -> Self {
        Self { db, catalog, extractor }
    }

    /// Opens the database (creating the schema if needed) and builds the configured
    /// catalog client and page extractor.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.url, config.database.max_connections).await?;
        db.init().await?;

        let catalog = Arc::new(MangaDexSource::new(&config.catalog)?);
        let extractor = ExtractorRegistry::from_config(&config.discovery)?.selected(&config.discovery)?;

        Ok(Self::new(db, catalog, extractor))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn chapter(&self, chapter_id: ChapterId) -> Result<Chapter> {
        self.db
            .get_chapter(chapter_id)
            .await?
            .ok_or(GrabberError::ChapterNotFound(chapter_id))
    }

    async fn chapter_of(&self, comic_id: ComicId, chapter_id: ChapterId) -> Result<Chapter> {
        let chapter = self.chapter(chapter_id).await?;
        if chapter.comic_id != comic_id {
            return Err(GrabberError::validation(format!(
                "chapter {chapter_id} does not belong to comic {comic_id}"
            )));
        }
        Ok(chapter)
    }

    /// Makes `urls` the chapter's whole page set: pages 1..=n in the given order,
    /// with anything stored beyond n removed.
    async fn store_pages(&self, chapter_id: ChapterId, urls: &[String]) -> Result<()> {
        let dropped = self.db.delete_pages_after(chapter_id, urls.len() as i64).await?;
        if dropped > 0 {
            debug!("Dropped {} stale pages from chapter {}", dropped, chapter_id);
        }
        for (index, url) in urls.iter().enumerate() {
            self.db.add_page(chapter_id, index as i64 + 1, url).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ComicBackend for LocalBackend {
    async fn is_ready(&self) -> bool {
        self.db.is_open()
    }

    async fn create_chapter(&self, comic_id: ComicId, chapter_number: f64, title: &str) -> Result<ChapterId> {
        if self.db.get_comic(comic_id).await?.is_none() {
            return Err(GrabberError::ComicNotFound(comic_id));
        }
        self.db.create_chapter(comic_id, chapter_number, title).await
    }

    async fn list_chapters_by_comic(&self, comic_id: ComicId) -> Result<Vec<Chapter>> {
        self.db.list_chapters_by_comic(comic_id).await
    }

    async fn add_page(&self, chapter_id: ChapterId, page_number: i64, asset_ref: &str) -> Result<PageId> {
        self.db.add_page(chapter_id, page_number, asset_ref).await
    }

    async fn list_pages_by_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Page>> {
        self.db.list_pages_by_chapter(chapter_id).await
    }

    async fn import_from_external_catalog(&self, external_id: &str) -> Result<ComicId> {
        let comic = NewComic {
            source_type: SourceType::ExternalCatalog,
            ..self.catalog.fetch_comic(external_id).await?
        };
        let id = self.db.create_comic(&comic).await?;
        info!("Imported '{}' from external catalog as comic {}", comic.title, id);
        Ok(id)
    }

    async fn fetch_chapter_list_from_external_catalog(&self, external_id: &str, comic_id: ComicId) -> Result<()> {
        if self.db.get_comic(comic_id).await?.is_none() {
            return Err(GrabberError::ComicNotFound(comic_id));
        }

        let chapters = self.catalog.fetch_chapter_list(external_id).await?;
        for chapter in &chapters {
            let id = self.db.upsert_catalog_chapter(comic_id, chapter).await?;
            debug!("Catalog chapter {} stored as {}", chapter.external_id, id);
        }

        info!("Stored {} catalog chapters for comic {}", chapters.len(), comic_id);
        Ok(())
    }

    async fn fetch_pages_from_external_catalog(&self, chapter_id: ChapterId) -> Result<()> {
        let chapter = self.chapter(chapter_id).await?;
        let external_id = chapter.external_id().ok_or(GrabberError::NotEligible(chapter_id))?;

        let urls = self.catalog.fetch_page_urls(external_id).await?;
        if urls.is_empty() {
            return Err(GrabberError::fetch_failed(FetchKind::Catalog, "catalog returned no pages"));
        }
        self.store_pages(chapter_id, &urls).await?;

        info!("Stored {} catalog pages for chapter {}", urls.len(), chapter.number_label());
        Ok(())
    }

    async fn fetch_pages_by_template(
        &self,
        comic_id: ComicId,
        chapter_id: ChapterId,
        url_template: &str,
        page_start: u32,
        page_end: u32,
    ) -> Result<()> {
        if !url_template.contains(PAGE_PLACEHOLDER) {
            return Err(GrabberError::validation(format!("URL template must contain {PAGE_PLACEHOLDER}")));
        }
        if page_start > page_end {
            return Err(GrabberError::validation(format!(
                "invalid page range: {page_start} is greater than {page_end}"
            )));
        }
        self.chapter_of(comic_id, chapter_id).await?;

        for page in page_start..=page_end {
            self.db
                .add_page(chapter_id, page as i64, &expand_page(url_template, page))
                .await?;
        }
        Ok(())
    }

    async fn fetch_pages_by_discovery(&self, comic_id: ComicId, chapter_id: ChapterId, chapter_url: &str) -> Result<()> {
        self.chapter_of(comic_id, chapter_id).await?;

        let urls = self.extractor.extract_pages(chapter_url).await?;
        self.store_pages(chapter_id, &urls).await?;

        info!("Stored {} discovered pages for chapter {}", urls.len(), chapter_id);
        Ok(())
    }
}
