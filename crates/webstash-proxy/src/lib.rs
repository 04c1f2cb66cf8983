//! Webstash Proxy - the caching reverse-proxy pipeline.
//!
//! One [`SiteServer`] runs per configured site. Every inbound request is
//! resolved to a cache location and an origin URL, served from disk when the
//! entry exists, and fetched-then-persisted when it does not. Text entries
//! get their configured third-party domains rewritten at serve time so a
//! cached site keeps working with no network at all.
//!
//! ## Architecture
//!
//! ```text
//! Client Request → Resolve Key → Per-Key Lock → Entry on disk?
//!                                                     │
//!                          ┌──────────────────────────┴───────────┐
//!                          │ Yes                                  │ No
//!                          ▼                                      ▼
//!                    Read Entry                     Fetch Origin (gzip decode)
//!                          │                                      │
//!                          ▼                                      ▼
//!               Classify → Rewrite → Serve                Persist Entry
//!                                                                 │
//!                                                                 ▼
//!                                                Classify → Rewrite → Serve
//! ```
//!
//! The per-key lock serializes the fetch-and-persist step per cache path:
//! concurrent misses for one key collapse into a single origin fetch, and
//! waiters serve the freshly written entry.

mod error;
mod fetch;
mod handler;
mod keylock;
mod server;
mod store;

pub use error::{ProxyError, Result};
pub use fetch::OriginFetcher;
pub use handler::{proxy_request, SiteState};
pub use keylock::KeyLocks;
pub use server::SiteServer;
pub use store::CacheStore;
