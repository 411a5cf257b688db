//! Rough content-type guess from a file extension.

use std::path::Path;

/// Fallback for unknown or missing extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

pub const TEXT_PLAIN: &str = "text/plain";

/// Map a file name to a mime type label by its extension.
///
/// `.tif` maps to `image/tif`, not `image/tiff`. Matching is case-sensitive.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match ext {
        // Text
        "txt" => TEXT_PLAIN,
        "xml" => "text/xml",

        // Images
        "jpg" => "image/jpeg",
        "tif" => "image/tif",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",

        // Video
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mp4" => "video/mp4",

        // Other
        "doc" => "application/msword",
        "pdf" => "application/pdf",

        _ => OCTET_STREAM,
    }
}
