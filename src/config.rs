use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub gramps: GrampsConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrampsConfig {
    /// Base URL of the Gramps Web instance, e.g. "https://gramps.example.org".
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Comma-separated surname filter; empty keeps everyone.
    #[serde(default)]
    pub surname_filter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedsConfig {
    /// Entries per feed in the daemon snapshot.
    #[serde(default = "default_entries")]
    pub entries: usize,
    #[serde(default = "default_true")]
    pub show_deathdays: bool,
    #[serde(default = "default_true")]
    pub show_anniversaries: bool,
    /// How long computed feeds are served from cache between polls.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            entries: default_entries(),
            show_deathdays: default_true(),
            show_anniversaries: default_true(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_entries() -> usize {
    6
}
fn default_true() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    /// Directory thumbnails are persisted under; unset keeps references
    /// pointing at the remote service.
    #[serde(default)]
    pub dir: Option<String>,
    /// Prefix the presentation layer serves the image directory under.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            public_prefix: default_public_prefix(),
            thumbnail_size: default_thumbnail_size(),
        }
    }
}

fn default_public_prefix() -> String {
    "/local/gramps".to_string()
}
fn default_thumbnail_size() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct DaemonConfig {
    /// Where the feed snapshot is written each cycle.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_scan_interval_hours")]
    pub scan_interval_hours: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            scan_interval_hours: default_scan_interval_hours(),
        }
    }
}

fn default_state_path() -> String {
    "kinfeed-state.json".to_string()
}
fn default_scan_interval_hours() -> u64 {
    6
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        if config.gramps.url.trim().is_empty() {
            anyhow::bail!("gramps.url must be set in {}", path.display());
        }
        Ok(config)
    }
}
