use std::ops::RangeInclusive;
use std::str::FromStr;

use tracing::info;

use crate::error::{FetchKind, GrabberError, Result};
use crate::models::{Chapter, ComicId};
use crate::template::{Placeholders, UrlTemplate};
use crate::traits::{ComicBackend, PageFetchStrategy};

/// Inclusive page-number range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(GrabberError::validation(format!(
                "invalid page range: {start} is greater than {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn iter(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl FromStr for PageRange {
    type Err = GrabberError;

    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = parse_bounds(s, "page")?;
        Self::new(start, end)
    }
}

/// Parses "A-B", "A..B" or a single "A" into numeric bounds.
pub(crate) fn parse_bounds(s: &str, what: &str) -> Result<(u32, u32)> {
    let s = s.trim();
    let (start, end) = s
        .split_once("..")
        .or_else(|| s.split_once('-'))
        .unwrap_or((s, s));
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| GrabberError::validation(format!("invalid {what} range bound: {v:?}")))
    };
    Ok((parse(start)?, parse(end)?))
}

/// Synthesizes page URLs from a template over a fixed page range. The backend call
/// covers the whole chapter; individual page failures are not tracked.
pub struct TemplatedRangeGrab {
    template: std::result::Result<UrlTemplate, String>,
    pages: PageRange,
}

impl TemplatedRangeGrab {
    /// Construction never fails; a bad template surfaces from [`validate`] so that
    /// the orchestrator rejects the run before any external call.
    ///
    /// [`validate`]: PageFetchStrategy::validate
    pub fn new(template: &str, pages: PageRange) -> Self {
        Self {
            template: UrlTemplate::parse(template, Placeholders::ChapterAndPage).map_err(|e| e.to_string()),
            pages,
        }
    }

    pub fn pages(&self) -> PageRange {
        self.pages
    }

    fn template(&self) -> Result<&UrlTemplate> {
        self.template
            .as_ref()
            .map_err(|e| GrabberError::validation(e.clone()))
    }
}

#[async_trait::async_trait]
impl PageFetchStrategy for TemplatedRangeGrab {
    fn kind(&self) -> FetchKind {
        FetchKind::Template
    }

    fn validate(&self) -> Result<()> {
        self.template()?;
        PageRange::new(self.pages.start, self.pages.end)?;
        Ok(())
    }

    async fn fetch(&self, backend: &dyn ComicBackend, comic_id: ComicId, chapter: &Chapter) -> Result<()> {
        let chapter_template = self.template()?.resolve(chapter.number, None);
        info!(
            "[TEMPLATE] Chapter {}: pages {}-{} from {}",
            chapter.number_label(),
            self.pages.start,
            self.pages.end,
            chapter_template
        );

        backend
            .fetch_pages_by_template(comic_id, chapter.id, &chapter_template, self.pages.start, self.pages.end)
            .await
            .map_err(|e| e.into_fetch_failure(self.kind()))
    }
}
