//! Serve-time localization of third-party domains in cached text.
//!
//! Cached pages reference their third-party assets by absolute URL. When
//! those domains are themselves cached (the instance's offline domains),
//! every occurrence is rewritten to route back through the proxy:
//! `https://cdn.example.com` becomes
//! `http://<listen_addr>/https/cdn.example.com`, which the resolver maps
//! straight back onto the explicit-scheme cache layout.
//!
//! The rewrite is a literal byte-substring replacement, applied globally,
//! non-overlapping, left to right. It does not parse markup and will match
//! inside comments or string literals; the entry on disk is never modified.

/// Rewrites configured offline domains into proxy-local references.
#[derive(Debug, Clone)]
pub struct DomainRewriter {
    rules: Vec<RewriteRule>,
}

#[derive(Debug, Clone)]
struct RewriteRule {
    from: Vec<u8>,
    to: Vec<u8>,
}

impl DomainRewriter {
    /// Builds the rewrite rules for one instance.
    ///
    /// Each domain's local equivalent is `http://<listen_addr>/` followed by
    /// the domain with its scheme separator collapsed to a path separator.
    pub fn new(listen_addr: &str, offline_domains: &[String]) -> Self {
        let rules = offline_domains
            .iter()
            .map(|domain| RewriteRule {
                from: domain.clone().into_bytes(),
                to: format!("http://{}/{}", listen_addr, domain.replacen("://", "/", 1))
                    .into_bytes(),
            })
            .collect();
        Self { rules }
    }

    /// True when no offline domains are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule to `data`, returning the rewritten bytes.
    pub fn apply(&self, data: Vec<u8>) -> Vec<u8> {
        let mut data = data;
        for rule in &self.rules {
            data = replace_all(&data, &rule.from, &rule.to);
        }
        data
    }
}

/// Replaces every occurrence of `needle` in `haystack`, non-overlapping,
/// left to right.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find(rest, needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
