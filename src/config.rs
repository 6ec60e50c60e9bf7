use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Environment variables with this prefix override file values, e.g.
/// `COMIC_GRABBER__DISCOVERY__API_KEY`.
pub const ENV_PREFIX: &str = "COMIC_GRABBER";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub discovery: DiscoveryConfig,
    pub grabber: GrabberConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// External metadata catalog (MangaDex-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub uploads_url: String,
    pub languages: Vec<String>,
    pub rate_limit_ms: u64,
    pub data_saver: bool,
    pub user_agent: Option<String>,
    pub feed_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Name of the extractor in the registry: "html" or "remote".
    pub provider: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub rate_limit_ms: u64,
    pub user_agent: Option<String>,
    pub image_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GrabberConfig {
    pub default_page_start: u32,
    pub default_page_end: u32,
}

impl Config {
    /// Loads `path` if it exists, then applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let defaults = toml::to_string(&Config::default())
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let settings = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml))
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig::default(),
            catalog: CatalogConfig::default(),
            discovery: DiscoveryConfig::default(),
            grabber: GrabberConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/comic-grabber.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mangadex.org".to_string(),
            uploads_url: "https://uploads.mangadex.org".to_string(),
            languages: vec!["en".to_string()],
            rate_limit_ms: 250,
            data_saver: false,
            user_agent: None,
            feed_page_size: 100,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider: "html".to_string(),
            endpoint: None,
            api_key: None,
            rate_limit_ms: 1500,
            user_agent: Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()),
            image_selectors: vec![
                ".reading-content img".to_string(),
                ".chapter-content img".to_string(),
                ".wp-manga-chapter-img".to_string(),
                ".page-break img".to_string(),
                "#readerarea img".to_string(),
                "img[data-src]".to_string(),
            ],
        }
    }
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            default_page_start: 1,
            default_page_end: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [catalog]
            rate_limit_ms = 900
            languages = ["id", "en"]

            [discovery]
            provider = "remote"
            endpoint = "https://scrape.example/v1/web/scrape"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.catalog.rate_limit_ms, 900);
        assert_eq!(config.catalog.languages, vec!["id", "en"]);
        assert_eq!(config.catalog.base_url, CatalogConfig::default().base_url);
        assert_eq!(config.discovery.provider, "remote");
        assert_eq!(config.grabber.default_page_end, 20);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.database.url = "sqlite:other.db".to_string();
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap().database.url, "sqlite:other.db");
    }
}
