use std::collections::HashSet;

use crate::models::{FormatEntry, MediaFormat};

pub const DEFAULT_QUALITY: &str = "720";

/// Video formats with a known height, one per `{height}p` label, tallest first.
///
/// When several formats share a height the first one yt-dlp listed is kept.
pub fn list_formats(formats: &[MediaFormat]) -> Vec<FormatEntry> {
    let mut seen = HashSet::new();
    let mut out: Vec<(u64, FormatEntry)> = Vec::new();

    for fmt in formats {
        let height = match fmt.height {
            Some(h) if h > 0 => h,
            _ => continue,
        };
        let quality = format!("{}p", height);
        if !seen.insert(quality.clone()) {
            continue;
        }
        out.push((
            height,
            FormatEntry {
                quality,
                format_note: fmt.format_note.clone().unwrap_or_default(),
                ext: fmt.ext.clone().unwrap_or_default(),
                filesize: fmt.filesize,
            },
        ));
    }

    out.sort_by(|a, b| b.0.cmp(&a.0));
    out.into_iter().map(|(_, entry)| entry).collect()
}

/// Quality token sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Audio,
    MaxHeight(u32),
    Best,
}

impl Quality {
    pub fn parse(token: &str) -> Self {
        match token {
            "audio" => Quality::Audio,
            "360" => Quality::MaxHeight(360),
            "720" => Quality::MaxHeight(720),
            "1080" => Quality::MaxHeight(1080),
            _ => Quality::Best,
        }
    }

    pub fn is_audio(self) -> bool {
        self == Quality::Audio
    }

    /// yt-dlp `-f` expression for this quality.
    pub fn format_selector(self) -> String {
        match self {
            Quality::Audio => "bestaudio/best".to_string(),
            Quality::MaxHeight(h) => format!("best[height<={}]/best", h),
            Quality::Best => "bestvideo+bestaudio/best".to_string(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        if self.is_audio() {
            "audio/mpeg"
        } else {
            "video/mp4"
        }
    }
}

pub fn format_selector(token: &str) -> String {
    Quality::parse(token).format_selector()
}
