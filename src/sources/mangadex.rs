use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::CatalogConfig;
use crate::error::{GrabberError, Result};
use crate::models::{same_chapter_number, CatalogChapter, ComicStatus, NewComic, SourceType};
use crate::traits::CatalogSource;
use crate::utils::HttpClient;

/// Client for a MangaDex-compatible metadata API.
pub struct MangaDexSource {
    http_client: HttpClient,
    config: CatalogConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    result: String,
    data: Vec<ChapterData>,
    total: u32,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default)]
    title: HashMap<String, String>,
    #[serde(default)]
    alt_titles: Vec<HashMap<String, String>>,
    #[serde(default)]
    description: HashMap<String, String>,
    status: Option<String>,
    content_rating: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    #[serde(default)]
    name: HashMap<String, String>,
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    kind: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationshipAttributes {
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    chapter: Option<String>,
    title: Option<String>,
    external_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHome {
    result: String,
    base_url: String,
    chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

impl MangaDexSource {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config.user_agent.as_deref(), config.rate_limit_ms)?,
            config: config.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    fn check(result: &str, what: &str) -> Result<()> {
        if result != "ok" {
            return Err(GrabberError::catalog(format!("{what} returned result {result:?}")));
        }
        Ok(())
    }

    /// Value in the first configured language, falling back to English.
    fn preferred(&self, values: &HashMap<String, String>) -> Option<String> {
        self.config
            .languages
            .iter()
            .map(String::as_str)
            .chain(std::iter::once("en"))
            .find_map(|lang| values.get(lang))
            .map(|s| s.trim().to_string())
    }

    fn localized(&self, values: &HashMap<String, String>) -> Option<String> {
        self.preferred(values)
            .or_else(|| values.values().next().map(|s| s.trim().to_string()))
    }

    fn to_new_comic(&self, manga: MangaData) -> NewComic {
        let attributes = manga.attributes;
        let title = self
            .preferred(&attributes.title)
            .or_else(|| attributes.alt_titles.iter().find_map(|t| self.preferred(t)))
            .or_else(|| self.localized(&attributes.title))
            .unwrap_or_else(|| manga.id.clone());

        let genres = attributes
            .tags
            .iter()
            .filter(|t| t.attributes.group.as_deref().map_or(true, |g| g == "genre" || g == "theme"))
            .filter_map(|t| self.localized(&t.attributes.name))
            .collect();

        let cover_blob_id = manga
            .relationships
            .iter()
            .filter(|r| r.kind == "cover_art")
            .find_map(|r| r.attributes.as_ref()?.file_name.clone())
            .map(|file| format!("{}/covers/{}/{}", self.config.uploads_url.trim_end_matches('/'), manga.id, file));

        NewComic {
            title,
            status: map_status(attributes.status.as_deref()),
            synopsis: self.localized(&attributes.description).unwrap_or_default(),
            genres,
            is_explicit: matches!(attributes.content_rating.as_deref(), Some("erotica") | Some("pornographic")),
            cover_blob_id,
            source_type: SourceType::ExternalCatalog,
        }
    }
}

pub fn map_status(status: Option<&str>) -> ComicStatus {
    match status {
        Some("completed") | Some("cancelled") => ComicStatus::Completed,
        Some("hiatus") => ComicStatus::Hiatus,
        _ => ComicStatus::Ongoing,
    }
}

#[async_trait::async_trait]
impl CatalogSource for MangaDexSource {
    async fn fetch_comic(&self, external_id: &str) -> Result<NewComic> {
        info!("[CATALOG] Fetching metadata for {}", external_id);
        let mut url = self.endpoint(&format!("/manga/{external_id}"))?;
        url.query_pairs_mut().append_pair("includes[]", "cover_art");

        let envelope: Envelope<MangaData> = self.http_client.get_json(url.as_str(), &[]).await?;
        Self::check(&envelope.result, "manga lookup")?;

        let comic = self.to_new_comic(envelope.data);
        debug!("[CATALOG] title={} status={} genres={:?}", comic.title, comic.status, comic.genres);
        Ok(comic)
    }

    async fn fetch_chapter_list(&self, external_id: &str) -> Result<Vec<CatalogChapter>> {
        info!("[CATALOG] Fetching chapter list for {}", external_id);
        let limit = self.config.feed_page_size.max(1);
        let mut offset = 0u32;
        let mut chapters: Vec<CatalogChapter> = Vec::new();

        loop {
            let mut url = self.endpoint(&format!("/manga/{external_id}/feed"))?;
            {
                let mut query = url.query_pairs_mut();
                for lang in &self.config.languages {
                    query.append_pair("translatedLanguage[]", lang);
                }
                query
                    .append_pair("order[chapter]", "asc")
                    .append_pair("limit", &limit.to_string())
                    .append_pair("offset", &offset.to_string());
            }

            let page: FeedPage = self.http_client.get_json(url.as_str(), &[]).await?;
            Self::check(&page.result, "chapter feed")?;
            let received = page.data.len() as u32;

            for entry in page.data {
                // Externally hosted chapters have no pages on the catalog.
                if entry.attributes.external_url.is_some() {
                    continue;
                }
                let number = entry
                    .attributes
                    .chapter
                    .as_deref()
                    .and_then(|c| c.trim().parse::<f64>().ok())
                    .filter(|n| n.is_finite())
                    .unwrap_or(0.0);
                if chapters.iter().any(|c| same_chapter_number(c.number, number)) {
                    continue;
                }
                chapters.push(CatalogChapter {
                    external_id: entry.id,
                    number,
                    title: entry.attributes.title.unwrap_or_default(),
                });
            }

            offset += received;
            if received == 0 || offset >= page.total {
                break;
            }
        }

        chapters.sort_by(|a, b| a.number.total_cmp(&b.number));
        info!("[CATALOG] {} chapters listed for {}", chapters.len(), external_id);
        Ok(chapters)
    }

    async fn fetch_page_urls(&self, external_chapter_id: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("/at-home/server/{external_chapter_id}"))?;
        let at_home: AtHome = self.http_client.get_json(url.as_str(), &[]).await?;
        Self::check(&at_home.result, "page server lookup")?;

        let (quality, files) = if self.config.data_saver && !at_home.chapter.data_saver.is_empty() {
            ("data-saver", &at_home.chapter.data_saver)
        } else {
            ("data", &at_home.chapter.data)
        };
        let base = at_home.base_url.trim_end_matches('/');

        Ok(files
            .iter()
            .map(|file| format!("{}/{}/{}/{}", base, quality, at_home.chapter.hash, file))
            .collect())
    }
}
