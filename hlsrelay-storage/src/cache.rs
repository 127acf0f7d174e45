// Cache hints for uploaded artifacts
//
// Playlists change every segment and must not be cached for long, media
// segments are immutable once written.

use std::path::Path;
use std::time::Duration;

const PLAYLIST_MAX_AGE: Duration = Duration::from_secs(1);
const SEGMENT_MAX_AGE: Duration = Duration::from_secs(600);
const PREVIEW_MAX_AGE: Duration = Duration::from_secs(20);
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// How long downstream caches may keep the object at `path`
#[must_use]
pub fn cache_max_age(path: &Path) -> Duration {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if matches!(file_name, "thumbnail.jpg" | "preview.gif") {
        return PREVIEW_MAX_AGE;
    }

    match extension(path).as_deref() {
        Some("m3u8") => PLAYLIST_MAX_AGE,
        Some("ts" | "m4s" | "mp4" | "aac") => SEGMENT_MAX_AGE,
        _ => DEFAULT_MAX_AGE,
    }
}

/// `Cache-Control` header value, e.g. "max-age=600"
#[must_use]
pub fn cache_control_header(path: &Path) -> String {
    format!("max-age={}", cache_max_age(path).as_secs())
}

#[must_use]
pub fn content_type(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        Some("aac") => "audio/aac",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
