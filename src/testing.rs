use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::{FetchKind, GrabberError, Result};
use crate::models::*;
use crate::template::expand_page;
use crate::traits::ComicBackend;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateChapter(ComicId, f64),
    ListChapters(ComicId),
    AddPage(ChapterId, i64),
    ListPages(ChapterId),
    Import(String),
    FetchChapterList(String, ComicId),
    FetchCatalogPages(ChapterId),
    FetchTemplate(ChapterId, String, u32, u32),
    FetchDiscovery(ChapterId, String),
}

#[derive(Default)]
struct State {
    next_id: i64,
    next_comic_id: ComicId,
    chapters: Vec<Chapter>,
    pages: Vec<Page>,
    calls: Vec<Call>,
    fail_create: Vec<f64>,
    fail_fetch: Vec<f64>,
    drop_connection: Vec<f64>,
    catalog_chapters: Vec<CatalogChapter>,
}

/// In-memory backend that records every call.
pub struct MemoryBackend {
    state: Mutex<State>,
    ready: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 100,
                next_comic_id: 1,
                ..State::default()
            }),
            ready: AtomicBool::new(true),
        }
    }

    pub fn with_next_comic_id(self, id: ComicId) -> Self {
        self.state.lock().unwrap().next_comic_id = id;
        self
    }

    pub fn with_catalog_chapters(self, numbers: impl IntoIterator<Item = u32>) -> Self {
        self.state.lock().unwrap().catalog_chapters = numbers
            .into_iter()
            .map(|n| CatalogChapter {
                external_id: format!("ext-{n}"),
                number: n as f64,
                title: format!("Chapter {n}"),
            })
            .collect();
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_create_for(&self, number: f64) {
        self.state.lock().unwrap().fail_create.push(number);
    }

    pub fn fail_fetch_for(&self, number: f64) {
        self.state.lock().unwrap().fail_fetch.push(number);
    }

    /// Fetches for `number` fail below the fetch layer, like a reset connection.
    pub fn drop_connection_for(&self, number: f64) {
        self.state.lock().unwrap().drop_connection.push(number);
    }

    pub fn insert_chapter(&self, comic_id: ComicId, number: f64, external_id: Option<&str>) -> Chapter {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let chapter = Chapter {
            id: state.next_id,
            comic_id,
            number,
            title: format!("Existing {number}"),
            external_chapter_id: external_id.map(str::to_string),
            created_at: Utc::now(),
        };
        state.chapters.push(chapter.clone());
        chapter
    }

    pub fn clear_external_id(&self, comic_id: ComicId, number: f64) {
        let mut state = self.state.lock().unwrap();
        for chapter in state.chapters.iter_mut() {
            if chapter.comic_id == comic_id && same_chapter_number(chapter.number, number) {
                chapter.external_chapter_id = None;
            }
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn chapters(&self, comic_id: ComicId) -> Vec<Chapter> {
        self.state
            .lock()
            .unwrap()
            .chapters
            .iter()
            .filter(|c| c.comic_id == comic_id)
            .cloned()
            .collect()
    }

    pub fn pages(&self, chapter_id: ChapterId) -> Vec<Page> {
        let mut pages: Vec<Page> = self
            .state
            .lock()
            .unwrap()
            .pages
            .iter()
            .filter(|p| p.chapter_id == chapter_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn chapter_number(state: &State, chapter_id: ChapterId) -> Result<f64> {
        state
            .chapters
            .iter()
            .find(|c| c.id == chapter_id)
            .map(|c| c.number)
            .ok_or(GrabberError::ChapterNotFound(chapter_id))
    }

    fn check_fetch(&self, kind: FetchKind, chapter_id: ChapterId) -> Result<()> {
        let state = self.state.lock().unwrap();
        let number = Self::chapter_number(&state, chapter_id)?;
        if state.fail_fetch.iter().any(|n| same_chapter_number(*n, number)) {
            return Err(GrabberError::fetch_failed(kind, format!("injected failure for chapter {number}")));
        }
        if state.drop_connection.iter().any(|n| same_chapter_number(*n, number)) {
            return Err(GrabberError::scraping("connection reset by peer"));
        }
        Ok(())
    }

    fn put_page(&self, chapter_id: ChapterId, page_number: i64, asset_ref: &str) -> PageId {
        let mut state = self.state.lock().unwrap();
        if let Some(page) = state
            .pages
            .iter_mut()
            .find(|p| p.chapter_id == chapter_id && p.page_number == page_number)
        {
            page.blob_id = asset_ref.to_string();
            return page.id;
        }
        state.next_id += 1;
        let id = state.next_id;
        state.pages.push(Page {
            id,
            chapter_id,
            page_number,
            blob_id: asset_ref.to_string(),
        });
        id
    }
}

#[async_trait::async_trait]
impl ComicBackend for MemoryBackend {
    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn create_chapter(&self, comic_id: ComicId, chapter_number: f64, title: &str) -> Result<ChapterId> {
        self.record(Call::CreateChapter(comic_id, chapter_number));
        let mut state = self.state.lock().unwrap();
        if state.fail_create.iter().any(|n| same_chapter_number(*n, chapter_number)) {
            return Err(GrabberError::catalog("create rejected"));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.chapters.push(Chapter {
            id,
            comic_id,
            number: chapter_number,
            title: title.to_string(),
            external_chapter_id: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_chapters_by_comic(&self, comic_id: ComicId) -> Result<Vec<Chapter>> {
        self.record(Call::ListChapters(comic_id));
        let mut chapters = self.chapters(comic_id);
        chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
        Ok(chapters)
    }

    async fn add_page(&self, chapter_id: ChapterId, page_number: i64, asset_ref: &str) -> Result<PageId> {
        self.record(Call::AddPage(chapter_id, page_number));
        Ok(self.put_page(chapter_id, page_number, asset_ref))
    }

    async fn list_pages_by_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Page>> {
        self.record(Call::ListPages(chapter_id));
        Ok(self.pages(chapter_id))
    }

    async fn import_from_external_catalog(&self, external_id: &str) -> Result<ComicId> {
        self.record(Call::Import(external_id.to_string()));
        let mut state = self.state.lock().unwrap();
        let id = state.next_comic_id;
        state.next_comic_id += 1;
        Ok(id)
    }

    async fn fetch_chapter_list_from_external_catalog(&self, external_id: &str, comic_id: ComicId) -> Result<()> {
        self.record(Call::FetchChapterList(external_id.to_string(), comic_id));
        let mut state = self.state.lock().unwrap();
        let entries = state.catalog_chapters.clone();
        for entry in entries {
            if let Some(existing) = state
                .chapters
                .iter_mut()
                .find(|c| c.comic_id == comic_id && same_chapter_number(c.number, entry.number))
            {
                existing.external_chapter_id = Some(entry.external_id.clone());
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.chapters.push(Chapter {
                id,
                comic_id,
                number: entry.number,
                title: entry.title.clone(),
                external_chapter_id: Some(entry.external_id.clone()),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn fetch_pages_from_external_catalog(&self, chapter_id: ChapterId) -> Result<()> {
        self.record(Call::FetchCatalogPages(chapter_id));
        let external = {
            let state = self.state.lock().unwrap();
            state
                .chapters
                .iter()
                .find(|c| c.id == chapter_id)
                .ok_or(GrabberError::ChapterNotFound(chapter_id))?
                .external_id()
                .map(str::to_string)
        };
        let external = external.ok_or(GrabberError::NotEligible(chapter_id))?;
        self.check_fetch(FetchKind::Catalog, chapter_id)?;
        for page in 1..=3 {
            self.put_page(chapter_id, page, &format!("https://catalog/{external}/{page}.png"));
        }
        Ok(())
    }

    async fn fetch_pages_by_template(
        &self,
        _comic_id: ComicId,
        chapter_id: ChapterId,
        url_template: &str,
        page_start: u32,
        page_end: u32,
    ) -> Result<()> {
        self.record(Call::FetchTemplate(chapter_id, url_template.to_string(), page_start, page_end));
        self.check_fetch(FetchKind::Template, chapter_id)?;
        for page in page_start..=page_end {
            self.put_page(chapter_id, page as i64, &expand_page(url_template, page));
        }
        Ok(())
    }

    async fn fetch_pages_by_discovery(&self, _comic_id: ComicId, chapter_id: ChapterId, chapter_url: &str) -> Result<()> {
        self.record(Call::FetchDiscovery(chapter_id, chapter_url.to_string()));
        self.check_fetch(FetchKind::Discovery, chapter_id)?;
        for page in 1..=2 {
            self.put_page(chapter_id, page, &format!("{chapter_url}img{page}.jpg"));
        }
        Ok(())
    }
}
