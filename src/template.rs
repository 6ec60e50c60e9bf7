use crate::error::{GrabberError, Result};
use crate::models::format_chapter_number;

pub const CHAPTER_PLACEHOLDER: &str = "{ch}";
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// Which placeholders a template must carry to be usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholders {
    /// `{ch}` only (page discovery).
    Chapter,
    /// `{ch}` and `{page}` (templated range grab).
    ChapterAndPage,
}

/// A validated template. The expanded result is not checked further: whatever
/// string comes out is accepted as a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
}

impl UrlTemplate {
    pub fn parse(raw: &str, required: Placeholders) -> Result<Self> {
        let raw = raw.trim();
        if !raw.contains(CHAPTER_PLACEHOLDER) {
            return Err(GrabberError::validation(format!(
                "URL template must contain {CHAPTER_PLACEHOLDER}"
            )));
        }
        if required == Placeholders::ChapterAndPage && !raw.contains(PAGE_PLACEHOLDER) {
            return Err(GrabberError::validation(format!(
                "URL template must contain {PAGE_PLACEHOLDER} for the page number"
            )));
        }
        Ok(Self { raw: raw.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fills `{ch}` and, when given, `{page}`. Without a page the page placeholder
    /// is left in place for a later [`expand_page`].
    pub fn resolve(&self, chapter: f64, page: Option<u32>) -> String {
        let url = self.raw.replace(CHAPTER_PLACEHOLDER, &format_chapter_number(chapter));
        match page {
            Some(page) => expand_page(&url, page),
            None => url,
        }
    }
}

pub fn expand_page(url: &str, page: u32) -> String {
    url.replace(PAGE_PLACEHOLDER, &page.to_string())
}

impl std::fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
