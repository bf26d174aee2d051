use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::sources::SourceKind;

/// Largest accepted `MAX_PAGES`. Search engines stop paging long before this.
pub const MAX_PAGE_CEILING: u32 = 100;

/// Which service fills in `content` for merged results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentMode {
    /// Firecrawl when an API key is configured, otherwise no enrichment.
    Auto,
    Firecrawl,
    /// Fetch each result page directly and keep its body text.
    Direct,
    Off,
}

impl FromStr for EnrichmentMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EnrichmentMode::Auto),
            "firecrawl" => Ok(EnrichmentMode::Firecrawl),
            "direct" => Ok(EnrichmentMode::Direct),
            "off" | "none" => Ok(EnrichmentMode::Off),
            other => Err(AppError::Config(format!("Invalid ENRICHMENT value: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::Config(format!("Invalid ENV value: {other}"))),
        }
    }
}

/// How often the error log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl FromStr for LogRotation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            other => Err(AppError::Config(format!("Invalid LOG_ROTATION value: {other}"))),
        }
    }
}

/// Process-wide settings, read once at startup and never mutated.
#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    pub openai_api_key: Option<String>,
    /// Pagination ceiling, also the default when a request omits `max_pages`.
    pub max_pages: u32,
    pub max_results_per_source: usize,
    /// Enabled primary sources in merge priority order.
    pub sources: Vec<SourceKind>,
    pub enrichment: EnrichmentMode,
    pub max_concurrency: usize,
    pub request_timeout: Duration,
    pub source_timeout: Duration,
    pub google_base_url: String,
    pub bing_base_url: String,
    pub custom_scheme: String,
    /// `{query}` and `{page}` are substituted per request.
    pub custom_search_path: String,
    pub log_level: String,
    /// Directory for the rolling error log. No file is written when unset.
    pub log_dir: Option<PathBuf>,
    pub log_rotation: LogRotation,
    /// Rotated error log files kept on disk.
    pub log_max_files: usize,
    pub environment: Environment,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            firecrawl_api_key: None,
            firecrawl_base_url: "https://api.firecrawl.dev".to_string(),
            openai_api_key: None,
            max_pages: 3,
            max_results_per_source: 10,
            sources: vec![SourceKind::Google, SourceKind::Bing, SourceKind::Custom],
            enrichment: EnrichmentMode::Auto,
            max_concurrency: 4,
            request_timeout: Duration::from_secs(60),
            source_timeout: Duration::from_secs(15),
            google_base_url: "https://www.google.com".to_string(),
            bing_base_url: "https://www.bing.com".to_string(),
            custom_scheme: "https".to_string(),
            custom_search_path: "/search?q={query}&page={page}".to_string(),
            log_level: "info".to_string(),
            log_dir: None,
            log_rotation: LogRotation::Daily,
            log_max_files: 10,
            environment: Environment::Development,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = parse_var("PORT", defaults.server_addr.port())?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let sources = match optional_var("SOURCES") {
            Some(list) => parse_sources(&list)?,
            None => defaults.sources,
        };

        let config = Config {
            server_addr: SocketAddr::new(ip, port),
            firecrawl_api_key: optional_var("FIRECRAWL_API_KEY"),
            firecrawl_base_url: optional_var("FIRECRAWL_BASE_URL")
                .unwrap_or(defaults.firecrawl_base_url),
            openai_api_key: optional_var("OPENAI_API_KEY"),
            max_pages: parse_var("MAX_PAGES", defaults.max_pages)?,
            max_results_per_source: parse_var(
                "MAX_RESULTS_PER_SOURCE",
                defaults.max_results_per_source,
            )?,
            sources,
            enrichment: parse_var("ENRICHMENT", defaults.enrichment)?,
            max_concurrency: parse_var("MAX_CONCURRENCY", defaults.max_concurrency)?,
            request_timeout: Duration::from_secs(parse_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            source_timeout: Duration::from_secs(parse_var(
                "SOURCE_TIMEOUT_SECS",
                defaults.source_timeout.as_secs(),
            )?),
            google_base_url: optional_var("GOOGLE_BASE_URL").unwrap_or(defaults.google_base_url),
            bing_base_url: optional_var("BING_BASE_URL").unwrap_or(defaults.bing_base_url),
            custom_scheme: optional_var("CUSTOM_SCHEME").unwrap_or(defaults.custom_scheme),
            custom_search_path: optional_var("CUSTOM_SEARCH_PATH")
                .unwrap_or(defaults.custom_search_path),
            log_level: optional_var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: optional_var("LOG_DIR").map(PathBuf::from),
            log_rotation: parse_var("LOG_ROTATION", defaults.log_rotation)?,
            log_max_files: parse_var("LOG_MAX_FILES", defaults.log_max_files)?,
            environment: parse_var("ENV", defaults.environment)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PAGE_CEILING).contains(&self.max_pages) {
            return Err(AppError::Config(format!(
                "MAX_PAGES must be between 1 and {MAX_PAGE_CEILING}"
            )));
        }
        if self.max_results_per_source == 0 {
            return Err(AppError::Config(
                "MAX_RESULTS_PER_SOURCE must be at least 1".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(AppError::Config("MAX_CONCURRENCY must be at least 1".into()));
        }
        if self.sources.is_empty() {
            return Err(AppError::Config("SOURCES must name at least one source".into()));
        }
        if self.log_max_files == 0 {
            return Err(AppError::Config("LOG_MAX_FILES must be at least 1".into()));
        }
        if self.request_timeout.is_zero() || self.source_timeout.is_zero() {
            return Err(AppError::Config("timeouts must be greater than 0".into()));
        }
        if self.enrichment == EnrichmentMode::Firecrawl && self.firecrawl_api_key.is_none() {
            return Err(AppError::Config(
                "FIRECRAWL_API_KEY is required for ENRICHMENT=firecrawl".into(),
            ));
        }
        Ok(())
    }
}

// API keys stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(key: &Option<String>) -> &'static str {
            if key.is_some() { "<set>" } else { "<unset>" }
        }

        f.debug_struct("Config")
            .field("server_addr", &self.server_addr)
            .field("firecrawl_api_key", &redact(&self.firecrawl_api_key))
            .field("firecrawl_base_url", &self.firecrawl_base_url)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("max_pages", &self.max_pages)
            .field("max_results_per_source", &self.max_results_per_source)
            .field("sources", &self.sources)
            .field("enrichment", &self.enrichment)
            .field("max_concurrency", &self.max_concurrency)
            .field("request_timeout", &self.request_timeout)
            .field("source_timeout", &self.source_timeout)
            .field("log_dir", &self.log_dir)
            .field("log_rotation", &self.log_rotation)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {key}: {e}"))),
        None => Ok(default),
    }
}

fn parse_sources(list: &str) -> Result<Vec<SourceKind>> {
    let mut sources = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let kind: SourceKind = name
            .parse()
            .map_err(|e: crate::error::SourceError| AppError::Config(e.to_string()))?;
        if !sources.contains(&kind) {
            sources.push(kind);
        }
    }
    Ok(sources)
}
