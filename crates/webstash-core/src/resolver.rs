//! Request path to cache location mapping.
//!
//! Every inbound path resolves to exactly two things: the file that would
//! hold its cached bytes, and the origin URL to fetch when that file does
//! not exist. Resolution is a pure function of the path and the instance
//! configuration; it never touches the filesystem or the network.
//!
//! Path forms, checked in order:
//!
//! - `https/<host>/<rest>` — explicit https target. The prefix names the
//!   scheme only; the remainder becomes both the cache location (relative
//!   to the cache root) and the authority-plus-path of the origin URL.
//! - `http/<host>/<rest>` — same, for plain http. Each branch strips only
//!   its own prefix; an `http/` path never has an `https/` token removed
//!   from it.
//! - anything else — resolved against the instance's default origin.
//!
//! A trailing slash marks a directory-like URL; the literal segment `index`
//! is appended so the entry has a concrete file name.

use std::path::PathBuf;

use crate::config::SiteConfig;

/// File name appended for directory-like URLs.
const INDEX_SEGMENT: &str = "index";

/// The outcome of resolving one inbound request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// On-disk location of the cache entry.
    pub cache_path: PathBuf,

    /// URL fetched from the origin on a miss.
    pub origin_url: String,
}

/// Maps a request path onto its cache location and origin URL.
///
/// `path` is the query-free request path with the leading `/` removed.
/// Resolution is total: every input yields a result.
pub fn resolve(path: &str, config: &SiteConfig) -> ResolvedRequest {
    let (mut relative, origin_url) = if let Some(rest) = path.strip_prefix("https/") {
        (rest.to_string(), format!("https://{rest}"))
    } else if let Some(rest) = path.strip_prefix("http/") {
        (rest.to_string(), format!("http://{rest}"))
    } else {
        (
            format!("{}/{}", config.default_server, path),
            format!(
                "{}://{}/{}",
                config.default_scheme, config.default_server, path
            ),
        )
    };

    if relative.is_empty() || relative.ends_with('/') {
        relative.push_str(INDEX_SEGMENT);
    }

    ResolvedRequest {
        cache_path: PathBuf::from(&config.cache_root).join(relative),
        origin_url,
    }
}
