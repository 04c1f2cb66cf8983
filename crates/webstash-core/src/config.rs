//! Site definition loading.
//!
//! Each proxy instance is described by one YAML file. A definition names the
//! site, the address the instance listens on, the origin it mirrors, where
//! cached bytes live on disk, and which third-party domains should be
//! rewritten to route back through the proxy.
//!
//! Loading is lenient: a directory is scanned for `*.yaml`/`*.yml` files and
//! every file that fails to read or parse is logged and skipped, so one bad
//! definition never takes down the other sites.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Favicon extensions considered when deriving a site icon.
const FAVICON_EXTENSIONS: &[&str] = &["ico", "png", "jpg", "jpeg", "svg"];

/// Errors raised while loading a site definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Definition file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Definition file is not valid YAML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// One site definition. Instantiates exactly one proxy instance and is
/// immutable for the lifetime of that instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Human-friendly site name, shown on the aggregator page.
    pub name: String,

    /// Short description, shown on the aggregator page.
    #[serde(default)]
    pub description: String,

    /// Address this instance listens on, e.g. `127.0.0.1:8099`.
    pub listen_addr: String,

    /// Origin host that unprefixed request paths resolve against.
    pub default_server: String,

    /// Scheme used for the default origin (`http` or `https`).
    pub default_scheme: String,

    /// Root directory of this site's cache tree.
    pub cache_root: String,

    /// Domains rewritten inside cached text so they route through the proxy.
    /// Applied in order.
    #[serde(default)]
    pub offline_domains: Vec<String>,

    /// Base64-encoded favicon bytes, derived at load time from the cache
    /// tree. Never part of the YAML file.
    #[serde(skip)]
    pub icon: Option<String>,
}

impl SiteConfig {
    /// Loads a single definition file and derives its favicon.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: SiteConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.icon = find_favicon(&config.site_dir());
        Ok(config)
    }

    /// Loads every `*.yaml`/`*.yml` definition under `dir`, in file-name
    /// order. Files that fail to read or parse are logged and skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> std::io::Result<Vec<SiteConfig>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| is_definition_file(path))
            .collect();
        paths.sort();

        let mut configs = Vec::new();
        for path in paths {
            match SiteConfig::from_file(&path) {
                Ok(config) => configs.push(config),
                Err(err) => warn!("skipping site definition: {err}"),
            }
        }
        Ok(configs)
    }

    /// Directory holding this site's default-origin cache entries.
    pub fn site_dir(&self) -> PathBuf {
        Path::new(&self.cache_root).join(&self.default_server)
    }
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Scans `dir` for a `favicon.*` file and returns its bytes base64-encoded.
///
/// Only well-known icon extensions are considered; the first readable match
/// wins. A missing directory or unreadable file simply yields `None`.
fn find_favicon(dir: &Path) -> Option<String> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.starts_with("favicon.") {
            continue;
        }
        let ext = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ext,
            None => continue,
        };
        if !FAVICON_EXTENSIONS.contains(&ext) {
            continue;
        }
        if let Ok(data) = fs::read(&path) {
            return Some(BASE64.encode(data));
        }
    }
    None
}
