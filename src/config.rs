//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines defaults.

use crate::utils::parse_id_list;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Default lifetime of an issued redirect link (10 minutes).
pub const DEFAULT_LINK_TTL_SECS: u64 = 600;
/// Default maximum number of live redirect links.
pub const DEFAULT_LINK_MAX_ENTRIES: usize = 10_000;
/// Default interval between expired-link sweeps.
pub const DEFAULT_LINK_SWEEP_INTERVAL_SECS: u64 = 60;
/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default OMDb endpoint.
pub const DEFAULT_OMDB_BASE_URL: &str = "http://www.omdbapi.com/";
/// Default content site searched for download links.
pub const DEFAULT_SCRAPER_BASE_URL: &str = "https://donyayeserial.com/";
/// Anchor text marking a download link on the content site ("download").
pub const DEFAULT_SCRAPER_LINK_MARKER: &str = "دانلود";
/// Default timeout for outbound HTTP requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
/// Maximum number of search results offered as buttons.
pub const DEFAULT_SEARCH_RESULT_LIMIT: usize = 10;

/// How strictly the scraper's first search result must match the requested title.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TitleMatch {
    /// Accept the first search result whatever its heading says.
    #[default]
    Loose,
    /// Require the first result's heading to contain the requested title.
    Strict,
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default, alias = "telegram_token")]
    pub bot_token: String,

    /// OMDb API key
    #[serde(default)]
    pub omdb_api_key: String,

    /// Comma-separated list of channel IDs the user must have joined
    #[serde(rename = "channel_ids")]
    pub channel_ids_str: Option<String>,

    /// Public host name used to build redirect links
    #[serde(default, alias = "koyeb_domain")]
    pub public_domain: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Lifetime of issued redirect links in seconds
    #[serde(default = "default_link_ttl_secs")]
    pub link_ttl_secs: u64,
    /// Maximum number of live redirect links
    #[serde(default = "default_link_max_entries")]
    pub link_max_entries: usize,
    /// Seconds between expired-link sweeps
    #[serde(default = "default_link_sweep_interval_secs")]
    pub link_sweep_interval_secs: u64,

    /// OMDb endpoint
    #[serde(default = "default_omdb_base_url")]
    pub omdb_base_url: String,
    /// Content site searched for download links
    #[serde(default = "default_scraper_base_url")]
    pub scraper_base_url: String,
    /// Visible anchor text identifying a download link
    #[serde(default = "default_scraper_link_marker")]
    pub scraper_link_marker: String,
    /// Title strictness for the scraper's first result
    #[serde(default)]
    pub scraper_title_match: TitleMatch,

    /// Timeout for outbound HTTP requests in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Maximum number of search results offered as buttons
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: usize,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_link_ttl_secs() -> u64 {
    DEFAULT_LINK_TTL_SECS
}

const fn default_link_max_entries() -> usize {
    DEFAULT_LINK_MAX_ENTRIES
}

const fn default_link_sweep_interval_secs() -> u64 {
    DEFAULT_LINK_SWEEP_INTERVAL_SECS
}

fn default_omdb_base_url() -> String {
    DEFAULT_OMDB_BASE_URL.to_string()
}

fn default_scraper_base_url() -> String {
    DEFAULT_SCRAPER_BASE_URL.to_string()
}

fn default_scraper_link_marker() -> String {
    DEFAULT_SCRAPER_LINK_MARKER.to_string()
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

const fn default_search_result_limit() -> usize {
    DEFAULT_SEARCH_RESULT_LIMIT
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `APP__PORT=9000 ./target/filmlink-bot`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Bare env vars; UPPER_SNAKE_CASE maps to snake_case, empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use filmlink_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::NotFound("BOT_TOKEN".to_string()));
        }
        if self.omdb_api_key.trim().is_empty() {
            return Err(ConfigError::NotFound("OMDB_API_KEY".to_string()));
        }
        if self.public_domain.trim().is_empty() {
            return Err(ConfigError::NotFound("PUBLIC_DOMAIN".to_string()));
        }
        Ok(())
    }

    /// Returns the channel IDs a user must belong to, in configured order
    #[must_use]
    pub fn channel_ids(&self) -> Vec<i64> {
        self.channel_ids_str
            .as_deref()
            .map(parse_id_list)
            .unwrap_or_default()
    }

    /// Base URL (scheme and host) that redirect links are built on
    #[must_use]
    pub fn public_base_url(&self) -> String {
        let domain = self.public_domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }
}
