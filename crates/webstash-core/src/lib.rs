//! Webstash Core - site definitions, cache key resolution, and content handling.
//!
//! This crate holds the pure, dependency-light pieces of the caching proxy:
//! the site configuration model (loaded from YAML definition files), the
//! mapping from request paths to cache locations and origin URLs, MIME
//! resolution for cached entries, and the serve-time rewriting that points
//! third-party domains back at the local proxy.
//!
//! Everything here is synchronous and free of network or server concerns;
//! the `webstash-proxy` crate wires these pieces into the request pipeline.

pub mod classify;
pub mod config;
pub mod resolver;
pub mod rewrite;

pub use config::{ConfigError, SiteConfig};
pub use resolver::{resolve, ResolvedRequest};
pub use rewrite::DomainRewriter;
