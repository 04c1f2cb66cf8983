//! The caching request pipeline.
//!
//! Every inbound request, regardless of method or path, flows through
//! [`proxy_request`]: resolve the cache location, take the per-key lock,
//! serve the entry if it exists, otherwise fetch it from the origin,
//! persist it, and serve the freshly written entry. Failures are terminal
//! for the request and rendered straight to the client; nothing is retried.

use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

use webstash_core::{classify, resolve, DomainRewriter, SiteConfig};

use crate::error::{ProxyError, Result};
use crate::fetch::OriginFetcher;
use crate::keylock::KeyLocks;
use crate::store::CacheStore;

/// Shared state for one site instance.
///
/// Owns the instance's immutable configuration and the pipeline pieces.
/// Instances share nothing with each other beyond the filesystem.
#[derive(Clone)]
pub struct SiteState {
    inner: Arc<SiteStateInner>,
}

struct SiteStateInner {
    config: SiteConfig,
    store: CacheStore,
    fetcher: OriginFetcher,
    locks: KeyLocks,
    rewriter: DomainRewriter,
}

impl SiteState {
    /// Builds the pipeline state for one site definition.
    pub fn new(config: SiteConfig) -> Self {
        let rewriter = DomainRewriter::new(&config.listen_addr, &config.offline_domains);
        Self {
            inner: Arc::new(SiteStateInner {
                config,
                store: CacheStore::new(),
                fetcher: OriginFetcher::new(),
                locks: KeyLocks::new(),
                rewriter,
            }),
        }
    }

    /// The instance's configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }
}

/// Handles one inbound request for a site instance.
pub async fn proxy_request(
    State(state): State<SiteState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    match handle(&state, method, &uri, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &SiteState, method: Method, uri: &Uri, body: Bytes) -> Result<Response> {
    let inner = &state.inner;
    let path = uri.path().trim_start_matches('/');
    let resolved = resolve(path, &inner.config);
    debug!(cache_path = %resolved.cache_path.display(), "try cache");

    // The guard covers reads too, so a request never observes an entry that
    // is still being written; waiters on an in-flight fetch re-check the
    // cache here and turn into hits.
    let _guard = inner.locks.acquire(&resolved.cache_path).await;

    if inner.store.exists(&resolved.cache_path).await {
        debug!(cache_path = %resolved.cache_path.display(), "cache hit");
        return serve_entry(inner, &resolved.cache_path).await;
    }

    info!(origin_url = %resolved.origin_url, "cache miss, fetching from origin");
    let outbound = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|err| ProxyError::Upstream(err.to_string()))?;
    let request_body = (method == Method::POST).then(|| body.to_vec());
    let data = inner
        .fetcher
        .fetch(outbound, &resolved.origin_url, request_body)
        .await?;

    inner.store.write(&resolved.cache_path, &data).await?;
    serve_entry(inner, &resolved.cache_path).await
}

/// Serves a cache entry: classify, conditionally rewrite, stream.
async fn serve_entry(inner: &SiteStateInner, path: &Path) -> Result<Response> {
    let data = inner.store.read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let mime = classify::classify(file_name, &data);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime);
    if classify::is_html(mime) {
        // Isolated browsing context, required by pages that use
        // shared-memory scripting.
        response = response
            .header("Cross-Origin-Embedder-Policy", "require-corp")
            .header("Cross-Origin-Opener-Policy", "same-origin");
    }

    let body = if classify::is_text_family(mime) && !inner.rewriter.is_empty() {
        debug!(%mime, "text entry, localizing offline domains");
        inner.rewriter.apply(data)
    } else {
        data
    };

    Ok(response.body(Body::from(body)).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::routing::{any, get};
    use axum::Router;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_router(config: SiteConfig) -> Router {
        Router::new()
            .fallback(proxy_request)
            .with_state(SiteState::new(config))
    }

    fn test_config(cache_root: &Path, default_server: &str, scheme: &str) -> SiteConfig {
        SiteConfig {
            name: "Test".to_string(),
            description: String::new(),
            listen_addr: "127.0.0.1:8099".to_string(),
            default_server: default_server.to_string(),
            default_scheme: scheme.to_string(),
            cache_root: cache_root.to_string_lossy().into_owned(),
            offline_domains: vec!["https://cdn.example.com".to_string()],
            icon: None,
        }
    }

    async fn spawn_origin(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn request(path: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn serves_existing_entry_without_an_origin() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), "unreachable.example", "http");
        std::fs::create_dir_all(dir.path().join("unreachable.example")).unwrap();
        std::fs::write(dir.path().join("unreachable.example/page.css"), b"body {}").unwrap();

        let response = test_router(config)
            .oneshot(request("/page.css"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/css"
        );
        assert_eq!(body_bytes(response).await, b"body {}");
    }

    #[tokio::test]
    async fn miss_fetches_persists_and_serves() {
        let origin = spawn_origin(Router::new().route(
            "/assets/app.js",
            get(|| async { "console.log('hi');" }),
        ))
        .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &origin.to_string(), "http");
        let response = test_router(config)
            .oneshot(request("/assets/app.js"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/javascript"
        );
        assert_eq!(body_bytes(response).await, b"console.log('hi');");

        let cached = dir
            .path()
            .join(origin.to_string())
            .join("assets/app.js");
        assert_eq!(std::fs::read(cached).unwrap(), b"console.log('hi');");
    }

    #[tokio::test]
    async fn second_request_is_served_from_disk() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let origin = spawn_origin(Router::new().route(
            "/once.txt",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "fetched"
                }
            }),
        ))
        .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &origin.to_string(), "http");
        let router = test_router(config);

        for _ in 0..2 {
            let response = router.clone().oneshot(request("/once.txt")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_fetch_the_origin_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let origin = spawn_origin(Router::new().route(
            "/slow.txt",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    "slow body"
                }
            }),
        ))
        .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &origin.to_string(), "http");
        let router = test_router(config);

        let (first, second) = tokio::join!(
            router.clone().oneshot(request("/slow.txt")),
            router.clone().oneshot(request("/slow.txt")),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_bytes(first).await, b"slow body");
        assert_eq!(body_bytes(second).await, b"slow body");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn trailing_slash_caches_under_index() {
        let origin =
            spawn_origin(Router::new().route("/blog/", get(|| async { "<html>blog</html>" })))
                .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &origin.to_string(), "http");
        let response = test_router(config)
            .oneshot(request("/blog/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cached = dir.path().join(origin.to_string()).join("blog/index");
        assert!(cached.is_file());
    }

    #[tokio::test]
    async fn html_entries_get_isolation_headers() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), "site.example", "http");
        std::fs::create_dir_all(dir.path().join("site.example")).unwrap();
        std::fs::write(
            dir.path().join("site.example/index.html"),
            b"<html></html>",
        )
        .unwrap();

        let response = test_router(config)
            .oneshot(request("/index.html"))
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get("Cross-Origin-Embedder-Policy")
                .unwrap(),
            "require-corp"
        );
        assert_eq!(
            response
                .headers()
                .get("Cross-Origin-Opener-Policy")
                .unwrap(),
            "same-origin"
        );
    }

    #[tokio::test]
    async fn binary_entries_skip_isolation_headers_and_rewrite() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), "site.example", "http");
        std::fs::create_dir_all(dir.path().join("site.example")).unwrap();
        // PNG magic followed by a configured domain as raw bytes; binary
        // entries are served verbatim.
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(b"https://cdn.example.com");
        std::fs::write(dir.path().join("site.example/pixel.png"), &png).unwrap();

        let response = test_router(config)
            .oneshot(request("/pixel.png"))
            .await
            .unwrap();
        assert!(response
            .headers()
            .get("Cross-Origin-Embedder-Policy")
            .is_none());
        assert_eq!(body_bytes(response).await, png);
    }

    #[tokio::test]
    async fn text_entries_are_rewritten_at_serve_time() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), "site.example", "http");
        std::fs::create_dir_all(dir.path().join("site.example")).unwrap();
        let on_disk = b"<script src=\"https://cdn.example.com/x.js\"></script>".to_vec();
        std::fs::write(dir.path().join("site.example/index.html"), &on_disk).unwrap();

        let response = test_router(config)
            .oneshot(request("/index.html"))
            .await
            .unwrap();
        assert_eq!(
            body_bytes(response).await,
            b"<script src=\"http://127.0.0.1:8099/https/cdn.example.com/x.js\"></script>"
        );

        // Serve-time only: the entry on disk is untouched.
        assert_eq!(
            std::fs::read(dir.path().join("site.example/index.html")).unwrap(),
            on_disk
        );
    }

    #[tokio::test]
    async fn post_body_is_forwarded_to_the_origin() {
        let origin = spawn_origin(Router::new().route(
            "/api/search",
            any(|body: Bytes| async move { body }),
        ))
        .await;

        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), &origin.to_string(), "http");
        let response = test_router(config)
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/api/search")
                    .body(Body::from("q=offline"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"q=offline");
    }

    #[tokio::test]
    async fn unreachable_origin_yields_bad_gateway() {
        let dir = TempDir::new().unwrap();
        // Nothing listens on port 9.
        let config = test_config(dir.path(), "127.0.0.1:9", "http");
        let response = test_router(config)
            .oneshot(request("/missing.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!dir.path().join("127.0.0.1:9/missing.txt").exists());
    }

    #[tokio::test]
    async fn explicit_scheme_path_targets_that_host() {
        let origin =
            spawn_origin(Router::new().route("/lib.js", get(|| async { "lib" }))).await;

        let dir = TempDir::new().unwrap();
        // Default server is unreachable; the explicit http/ prefix must win.
        let config = test_config(dir.path(), "unreachable.example", "http");
        let response = test_router(config)
            .oneshot(request(&format!("/http/{origin}/lib.js")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join(origin.to_string()).join("lib.js").is_file());
    }
}
