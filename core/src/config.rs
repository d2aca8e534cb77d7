use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::{
    cache::SourceCache,
    index::{header::discover_chunks, header::DEFAULT_HEADER_FILE_NAME, GeoIndex},
    remote::{http::DEFAULT_TIMEOUT_SECS, QueryTemplate, RemoteLoader, ReqwestFetcher},
    source::{xml::DEFAULT_DATA_FILE_NAME, XmlSourceBuilder},
};

/// location of the config file, relative to $HOME
const CONFIG_PATH: &str = ".config/geochunk/config.toml";

/// environment variable overriding the config file location
pub const CONFIG_ENV: &str = "GEOCHUNK_CONFIG";

const DEFAULT_QUERY: &str = "{0},{1},{2},{3}";
const DEFAULT_FORMAT: &str = "xml";

/// Settings for chunks stored on the local file system
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// Directory scanned for chunks. No local chunks are used if absent.
    pub root: Option<PathBuf>,

    #[serde(default = "default_header")]
    pub header: String,

    #[serde(default = "default_data")]
    pub data: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: None,
            header: default_header(),
            data: default_data(),
        }
    }
}

/// Settings for the remote fallback
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    pub server: String,

    #[serde(default = "default_query")]
    pub query: String,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub local: LocalConfig,

    pub remote: Option<RemoteConfig>,
}

fn default_header() -> String {
    DEFAULT_HEADER_FILE_NAME.to_string()
}

fn default_data() -> String {
    DEFAULT_DATA_FILE_NAME.to_string()
}

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Determines the config file location from `$GEOCHUNK_CONFIG` or `$HOME`
pub fn default_path() -> Result<PathBuf> {
    default_path_from(|name| std::env::var(name).ok())
}

fn default_path_from(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = env("HOME").context("$HOME not set")?;
    Ok(Path::new(&home).join(CONFIG_PATH))
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).context("configuration malformed")
    }

    /// Reads the configuration from `path`. A relative `local.root` is
    /// resolved against the directory containing the file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read configuration file at {path:?}"))?;
        let mut config = Self::from_toml(&contents)?;
        if let (Some(root), Some(dir)) = (&config.local.root, path.parent()) {
            if root.is_relative() {
                config.local.root = Some(dir.join(root));
            }
        }
        Ok(config)
    }

    /// Like [`Config::load`], but returns the default configuration if the
    /// file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "no configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Scans the local root (if any) and builds the index
    pub fn build_index(&self) -> Result<GeoIndex> {
        let Some(root) = &self.local.root else {
            return Ok(GeoIndex::new());
        };
        let chunks = discover_chunks(root, &self.local.header)
            .with_context(|| format!("unable to scan chunk directory {root:?}"))?;
        Ok(GeoIndex::bulk_load(chunks))
    }

    /// Creates the remote loader if a remote endpoint is configured
    pub fn build_remote(&self) -> Result<Option<RemoteLoader>> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        let template = remote
            .query
            .parse::<QueryTemplate>()
            .with_context(|| format!("invalid remote query template `{}'", remote.query))?;
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(remote.timeout_secs))?;
        Ok(Some(RemoteLoader::new(
            remote.server.clone(),
            template,
            remote.format.clone(),
            Box::new(fetcher),
        )))
    }

    /// Builds the index and the source cache described by this configuration
    pub fn build_cache(&self) -> Result<SourceCache> {
        let index = self.build_index()?;
        let builder = Arc::new(XmlSourceBuilder::new(self.local.data.clone()));
        let cache = SourceCache::new(index, builder);
        Ok(match self.build_remote()? {
            Some(remote) => cache.with_remote(remote),
            None => cache,
        })
    }
}
