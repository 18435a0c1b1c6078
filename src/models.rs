//! Typed records exchanged with yt-dlp and with API callers.
//!
//! yt-dlp's JSON is loosely shaped: numbers show up as ints or floats, and
//! any field may be missing or `null`. Everything is read leniently here so the
//! rest of the crate only ever sees plain Rust types.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// The subset of yt-dlp's info dict this service reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extractor: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub formats: Vec<MediaFormat>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub requested_downloads: Vec<RequestedDownload>,
}

impl MediaInfo {
    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => "Unknown Title",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFormat {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub format_note: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ext: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
}

/// Final on-disk location yt-dlp reports after post-processing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestedDownload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub filepath: Option<String>,
}

impl RequestedDownload {
    pub fn path(&self) -> Option<PathBuf> {
        self.filepath.as_ref().filter(|p| !p.is_empty()).map(PathBuf::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatEntry {
    pub quality: String,
    pub format_note: String,
    pub ext: String,
    pub filesize: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration: String,
    pub thumbnail: String,
    pub platform: String,
    pub formats: Vec<FormatEntry>,
}

impl From<&MediaInfo> for VideoInfo {
    fn from(info: &MediaInfo) -> Self {
        Self {
            title: info.title_or_default().to_string(),
            duration: crate::util::format_duration(info.duration),
            thumbnail: info.thumbnail.clone().unwrap_or_default(),
            platform: crate::util::detect_platform(info.extractor.as_deref().unwrap_or("")),
            formats: crate::formats::list_formats(&info.formats),
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Entries that do not look like `T` are dropped instead of failing the whole dict.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
