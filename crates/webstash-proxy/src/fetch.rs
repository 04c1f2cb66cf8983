//! Origin fetching with transparent gzip decoding.
//!
//! A cache miss turns into exactly one outbound request. The inbound method
//! is mirrored and the inbound body is forwarded for POST; inbound headers
//! are deliberately NOT forwarded, since a cached entry must not depend on
//! who requested it. Connection, TLS, and redirect handling are the client's
//! defaults; there is no retry or timeout policy here.
//!
//! If the origin declares `Content-Encoding: gzip`, the body is decoded
//! before anything downstream (the store, the client) ever sees it, so the
//! cache always holds plain bytes. A malformed gzip stream aborts the
//! request and nothing is cached.

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::header::CONTENT_ENCODING;
use reqwest::{Client, Method};

use crate::error::{ProxyError, Result};

/// Outbound HTTP client for cache misses.
#[derive(Debug, Clone, Default)]
pub struct OriginFetcher {
    client: Client,
}

impl OriginFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Fetches `url` with `method`, attaching `body` when present.
    ///
    /// Returns the full response body, gzip-decoded when the origin declared
    /// it. The response status is not inspected; whatever the origin sends
    /// back is the entry.
    pub async fn fetch(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;

        let is_gzip = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);

        let data = response
            .bytes()
            .await
            .map_err(|err| ProxyError::Upstream(err.to_string()))?;

        if is_gzip {
            decompress_gzip(&data)
        } else {
            Ok(data.to_vec())
        }
    }
}

/// Decodes a gzip-compressed buffer in full.
pub(crate) fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(ProxyError::Decompress)?;
    Ok(out)
}
