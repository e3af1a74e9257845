//! Magic-byte mime detection for blob payloads.
//!
//! Detection always runs on the unencrypted bytes. Unknown content yields
//! `None` and the entry simply carries no encoding format.

/// Detect the mime type of the data from its leading bytes.
pub fn detect(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if data.starts_with(&[b'P', b'K', 0x03, 0x04]) {
        return Some("application/zip");
    }
    if data.starts_with(&[0x1F, 0x8B]) {
        return Some("application/gzip");
    }
    if matches!(data.first(), Some(b'{') | Some(b'[')) {
        if serde_json::from_slice::<serde_json::Value>(data).is_ok() {
            return Some("application/json");
        }
    }
    if !data.is_empty() && is_plain_text(data) {
        return Some("text/plain");
    }
    None
}

/// Default file extension for a mime type.
pub fn default_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "application/pdf" => Some("pdf"),
        "application/zip" => Some("zip"),
        "application/gzip" => Some("gz"),
        "application/json" => Some("json"),
        "text/plain" => Some("txt"),
        "application/octet-stream" => Some("bin"),
        _ => None,
    }
}

fn is_plain_text(data: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(data) else {
        return false;
    };
    text.chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}
