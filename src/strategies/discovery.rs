use tracing::info;

use crate::error::{FetchKind, GrabberError, Result};
use crate::models::{Chapter, ComicId};
use crate::template::{Placeholders, UrlTemplate};
use crate::traits::{ComicBackend, PageFetchStrategy};

/// Hands a chapter URL to the page-discovery collaborator, which decides how many
/// pages there are. No page range applies.
pub struct PageDiscoveryGrab {
    source: ChapterUrl,
}

enum ChapterUrl {
    /// One fixed URL, for single-chapter grabs.
    Fixed(String),
    /// `{ch}` template, resolved per chapter in a batch.
    Template(std::result::Result<UrlTemplate, String>),
}

impl PageDiscoveryGrab {
    pub fn for_url(chapter_url: &str) -> Self {
        Self {
            source: ChapterUrl::Fixed(chapter_url.trim().to_string()),
        }
    }

    pub fn for_template(template: &str) -> Self {
        Self {
            source: ChapterUrl::Template(
                UrlTemplate::parse(template, Placeholders::Chapter).map_err(|e| e.to_string()),
            ),
        }
    }

    fn chapter_url(&self, chapter: &Chapter) -> Result<String> {
        match &self.source {
            ChapterUrl::Fixed(url) => Ok(url.clone()),
            ChapterUrl::Template(template) => template
                .as_ref()
                .map(|t| t.resolve(chapter.number, None))
                .map_err(|e| GrabberError::validation(e.clone())),
        }
    }
}

#[async_trait::async_trait]
impl PageFetchStrategy for PageDiscoveryGrab {
    fn kind(&self) -> FetchKind {
        FetchKind::Discovery
    }

    fn validate(&self) -> Result<()> {
        match &self.source {
            ChapterUrl::Fixed(url) if url.is_empty() => Err(GrabberError::validation("chapter URL is empty")),
            ChapterUrl::Fixed(_) => Ok(()),
            ChapterUrl::Template(template) => template
                .as_ref()
                .map(|_| ())
                .map_err(|e| GrabberError::validation(e.clone())),
        }
    }

    async fn fetch(&self, backend: &dyn ComicBackend, comic_id: ComicId, chapter: &Chapter) -> Result<()> {
        let url = self.chapter_url(chapter)?;
        info!("[DISCOVERY] Chapter {}: discovering pages at {}", chapter.number_label(), url);

        backend
            .fetch_pages_by_discovery(comic_id, chapter.id, &url)
            .await
            .map_err(|e| e.into_fetch_failure(self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MemoryBackend};

    #[test]
    fn template_needs_only_chapter_placeholder() {
        assert!(PageDiscoveryGrab::for_template("https://x/chapter-{ch}/").validate().is_ok());
        assert!(PageDiscoveryGrab::for_template("https://x/chapter/").validate().unwrap_err().is_validation());
        assert!(PageDiscoveryGrab::for_url("  ").validate().unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn template_resolves_per_chapter() {
        let backend = MemoryBackend::new();
        let chapter = backend.insert_chapter(1, 8.0, None);

        PageDiscoveryGrab::for_template("https://x/chapter-{ch}/")
            .fetch(&backend, 1, &chapter)
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![Call::FetchDiscovery(chapter.id, "https://x/chapter-8/".to_string())]
        );
    }

    #[tokio::test]
    async fn extractor_errors_become_discovery_failures() {
        let backend = MemoryBackend::new();
        let chapter = backend.insert_chapter(1, 2.0, None);
        backend.drop_connection_for(2.0);

        let err = PageDiscoveryGrab::for_url("https://x/chapter-2/")
            .fetch(&backend, 1, &chapter)
            .await
            .unwrap_err();

        assert!(matches!(err, GrabberError::FetchFailed { kind: FetchKind::Discovery, .. }));
    }
}
