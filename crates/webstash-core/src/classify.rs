//! Content-type resolution for cached entries.
//!
//! Cache entries carry no metadata, so the `Content-Type` served with an
//! entry is re-derived on every hit: first from the file extension, then by
//! sniffing the leading bytes, and finally falling back to
//! `application/octet-stream`. The resolved type also decides whether the
//! domain rewriter runs and whether cross-origin isolation headers are
//! emitted.

use std::path::Path;

/// Fallback type when neither extension nor content yields a match.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Resolves the MIME type for a cache entry from its file name and bytes.
pub fn classify(file_name: &str, content: &[u8]) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    if let Some(mime) = ext.as_deref().and_then(from_extension) {
        return mime;
    }
    sniff(content).unwrap_or(OCTET_STREAM)
}

/// Looks up a MIME type from a lowercase file extension.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "html" | "htm" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Sniffs a MIME type from the leading bytes of an entry.
///
/// Magic numbers are checked first; text-looking content falls through to a
/// small set of heuristics. Returns `None` when nothing matches.
pub fn sniff(content: &[u8]) -> Option<&'static str> {
    if content.is_empty() {
        return None;
    }

    if let Some(mime) = sniff_magic(content) {
        return Some(mime);
    }

    let first = content
        .iter()
        .copied()
        .find(|byte| !byte.is_ascii_whitespace())?;
    match first {
        b'<' => Some("text/html"),
        b'{' | b'[' => Some("application/json"),
        _ if looks_textual(content) => Some("text/plain"),
        _ => None,
    }
}

/// Detects well-known binary formats by magic bytes.
fn sniff_magic(content: &[u8]) -> Option<&'static str> {
    const MAGICS: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"wOFF", "font/woff"),
        (b"wOF2", "font/woff2"),
        (b"\x00asm", "application/wasm"),
    ];

    for (magic, mime) in MAGICS {
        if content.starts_with(magic) {
            return Some(mime);
        }
    }
    // RIFF container: the format tag sits after the chunk size.
    if content.len() >= 12 && content.starts_with(b"RIFF") && &content[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

/// True when the leading bytes contain no NUL and are mostly printable.
fn looks_textual(content: &[u8]) -> bool {
    let window = &content[..content.len().min(512)];
    if window.contains(&0) {
        return false;
    }
    let printable = window
        .iter()
        .filter(|byte| byte.is_ascii_graphic() || byte.is_ascii_whitespace())
        .count();
    printable * 10 >= window.len() * 9
}

/// True for types the domain rewriter is applied to: any `text/*` type plus
/// the textual application types.
pub fn is_text_family(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(
            mime,
            "application/json"
                | "application/javascript"
                | "application/xml"
                | "application/xhtml+xml"
        )
}

/// True when serving this type should emit cross-origin isolation headers.
pub fn is_html(mime: &str) -> bool {
    mime == "text/html"
}
