//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;
use crate::request::DEFAULT_MAX_TAGS;

mod cli;

pub use cli::{ClassifierOverrides, ClassifyArgs, CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "roller";
const ENV_PREFIX: &str = "ROLLER";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub tags: TagSettings,
    pub cache: CacheSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct TagSettings {
    /// Largest tag intersection a `/tags/...` view may ask for.
    pub max_intersection_size: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub planet: CacheTierSettings,
    pub weblog_page: CacheTierSettings,
    pub salt: CacheTierSettings,
}

/// Settings of one `cache.<id>` block.
#[derive(Debug, Clone)]
pub struct CacheTierSettings {
    pub enabled: bool,
    pub size: NonZeroUsize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SiteSettings {
    /// TOML file describing the weblogs served by the in-memory lookup.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Classify(args)) => raw.apply_classifier_overrides(&args.classifier),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    tags: RawTagSettings,
    cache: RawCacheSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(file) = overrides.site_file.as_ref() {
            self.site.file = Some(file.clone());
        }
        if overrides.no_cache {
            self.cache.planet.enabled = Some(false);
            self.cache.weblogpage.enabled = Some(false);
        }

        self.apply_classifier_overrides(&overrides.classifier);
    }

    fn apply_classifier_overrides(&mut self, overrides: &ClassifierOverrides) {
        if let Some(max) = overrides.max_tags {
            self.tags.queries.max_intersection_size = Some(max);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            tags,
            cache,
            site,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let tags = build_tag_settings(tags)?;
        let cache = build_cache_settings(cache)?;
        let site = build_site_settings(site)?;

        Ok(Self {
            server,
            logging,
            tags,
            cache,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_tag_settings(tags: RawTagSettings) -> Result<TagSettings, LoadError> {
    let max = tags
        .queries
        .max_intersection_size
        .unwrap_or(DEFAULT_MAX_TAGS as u64);

    Ok(TagSettings {
        max_intersection_size: non_zero_usize(max, "tags.queries.max_intersection_size")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    Ok(CacheSettings {
        planet: build_cache_tier(
            cache.planet,
            CacheConfig::planet(),
            ("cache.planet.size", "cache.planet.timeout"),
        )?,
        weblog_page: build_cache_tier(
            cache.weblogpage,
            CacheConfig::weblog_page(),
            ("cache.weblogpage.size", "cache.weblogpage.timeout"),
        )?,
        salt: build_cache_tier(
            cache.salt,
            CacheConfig::salt(),
            ("cache.salt.size", "cache.salt.timeout"),
        )?,
    })
}

fn build_cache_tier(
    raw: RawCacheTier,
    defaults: CacheConfig,
    (size_key, timeout_key): (&'static str, &'static str),
) -> Result<CacheTierSettings, LoadError> {
    let size = raw.size.unwrap_or(defaults.size as u64);
    let timeout_secs = raw.timeout.unwrap_or(defaults.timeout.as_secs());
    if timeout_secs == 0 {
        return Err(LoadError::invalid(timeout_key, "must be greater than zero"));
    }

    Ok(CacheTierSettings {
        enabled: raw.enabled.unwrap_or(defaults.enabled),
        size: non_zero_usize(size, size_key)?,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let file = site.file.filter(|path| !path.as_os_str().is_empty());
    Ok(SiteSettings { file })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTagSettings {
    queries: RawTagQuerySettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTagQuerySettings {
    // file keys keep their case, environment keys arrive lowercased
    #[serde(alias = "maxIntersectionSize", alias = "maxintersectionsize")]
    max_intersection_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    planet: RawCacheTier,
    weblogpage: RawCacheTier,
    salt: RawCacheTier,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheTier {
    enabled: Option<bool>,
    size: Option<u64>,
    /// Seconds.
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    file: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
