const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 100;

/// Replace characters that are invalid in file names and cap the length.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

pub fn sanitize_filename_component(s: &str) -> String {
    // Keep this conservative: avoid path separators and other odd chars.
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect()
}

/// `H:MM:SS` when the duration reaches an hour, otherwise `M:SS`.
pub fn format_duration(seconds: Option<u64>) -> String {
    let total = match seconds {
        Some(s) if s > 0 => s,
        _ => return "Unknown".to_string(),
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

const KNOWN_PLATFORMS: &[&str] = &["tiktok", "youtube", "facebook", "instagram", "twitter"];

/// Map a yt-dlp extractor name (e.g. `youtube:tab`, `TikTok`) to a platform tag.
pub fn detect_platform(extractor: &str) -> String {
    let lower = extractor.to_lowercase();
    KNOWN_PLATFORMS
        .iter()
        .find(|p| lower.contains(*p))
        .map(|p| p.to_string())
        .unwrap_or(lower)
}

pub fn content_type_for(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
