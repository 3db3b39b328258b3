//! Media-type detection for uploaded files.
//!
//! Classification prefers byte signatures over the filename extension so a
//! mislabeled upload still routes to the right extraction strategy. Unknown
//! input falls back to `application/octet-stream`; detection never fails.

/// Generic fallback media type for unrecognized content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Classify a file's media type from its bytes and filename.
///
/// Precedence: byte-content sniffing, then extension mapping, then the
/// generic binary fallback.
pub fn detect_media_type(filename: &str, bytes: &[u8]) -> String {
    sniff_from_bytes(bytes)
        .or_else(|| from_extension(filename))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Inspect magic numbers and structural signatures at the start of the file.
fn sniff_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let trimmed = head.trim_start().to_ascii_lowercase();
    if trimmed.starts_with("<!doctype html") || trimmed.starts_with("<html") {
        return Some("text/html");
    }
    if trimmed.starts_with("<?xml") {
        return Some("text/xml");
    }

    None
}

/// Map a filename extension to a media type.
fn from_extension(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit('.').next()?.to_ascii_lowercase();
    let media_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => return None,
    };
    Some(media_type)
}
