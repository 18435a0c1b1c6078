use actix_web::http::header::{
    Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue, CACHE_CONTROL,
    CONTENT_LENGTH,
};
use actix_web::{web, HttpResponse, Responder};
use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Deserializer};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::{AppError, Result};
use crate::extractor::DownloadJob;
use crate::formats::{Quality, DEFAULT_QUALITY};
use crate::models::VideoInfo;
use crate::state::AppState;
use crate::util;

#[derive(Deserialize)]
pub struct FetchInfoRequest {
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    // "audio" | "360" | "720" | "1080"; anything else means best available.
    #[serde(default, deserialize_with = "quality_token")]
    pub quality: Option<String>,
}

/// Clients send the quality as `"720"` or `720`; other shapes count as absent.
fn quality_token<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Malformed or missing JSON bodies get the same `{error}` shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::Validation(format!("Invalid JSON body: {}", err)).into())
}

fn require_url(url: Option<&str>) -> Result<String> {
    let url = url.ok_or_else(|| AppError::Validation("No URL provided".to_string()))?;
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("Empty URL provided".to_string()));
    }
    Ok(url.to_string())
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>AllVideoSaver</title>
    <meta http-equiv="refresh" content="0; url=/static/index.html">
</head>
<body>
    <p>Redirecting to <a href="/static/index.html">AllVideoSaver</a>...</p>
</body>
</html>
"#;

pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub async fn static_file(name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let name = util::sanitize_filename_component(&name);
    if name.is_empty() || name.starts_with('.') {
        return Err(AppError::NotFound("static asset".to_string()));
    }
    let path = state.config.static_dir.join(&name);

    let file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(name));
        }
        Err(e) => return Err(e.into()),
    };
    let meta = file.metadata().await?;
    if !meta.is_file() {
        return Err(AppError::NotFound(name));
    }

    Ok(HttpResponse::Ok()
        .content_type(util::content_type_for(&path))
        .append_header((CONTENT_LENGTH, meta.len().to_string()))
        .streaming(file_stream(file)))
}

pub async fn fetch_info(req: web::Json<FetchInfoRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let url = require_url(req.url.as_deref())?;
    log::info!("[INFO] Request: url={}", url);

    let info = state.extractor.probe(&url).await.map_err(|e| {
        log::error!("[INFO] Error fetching info: {}", e);
        e
    })?;

    let video = VideoInfo::from(&info);
    log::info!("[INFO] Fetched info: {} ({} formats)", video.title, video.formats.len());

    Ok(HttpResponse::Ok()
        .append_header((CACHE_CONTROL, "no-store"))
        .json(video))
}

pub async fn download(req: web::Json<DownloadRequest>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let url = require_url(req.url.as_deref())?;
    let quality = req
        .quality
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUALITY)
        .to_string();

    let job = DownloadJob::new(url, quality, &state.config.download_dir);
    log::info!(
        "[DOWNLOAD] Request: quality={} url={} stem={}",
        job.quality,
        job.url,
        job.stem
    );

    let downloaded = state.extractor.download(&job).await.map_err(|e| {
        log::error!("[DOWNLOAD] Download error: {}", e);
        e
    })?;
    log::info!(
        "[DOWNLOAD] Downloaded: {} -> {}",
        downloaded.info.title_or_default(),
        downloaded.path.display()
    );

    // The file is handed off from here on; it goes away after the delay whatever happens next.
    state.cleanup.schedule(downloaded.path.clone());

    let kind = job.kind();
    let filename = attachment_name(downloaded.info.title_or_default(), &job.quality, kind);

    let file = File::open(&downloaded.path).await?;
    let len = file.metadata().await?.len();

    Ok(HttpResponse::Ok()
        .content_type(kind.mime_type())
        .append_header((CONTENT_LENGTH, len.to_string()))
        .insert_header(attachment(&filename))
        .append_header((CACHE_CONTROL, "no-store"))
        .streaming(file_stream(file)))
}

/// `{title}.mp3` for audio, `{title}_{quality}p.mp4` for video.
pub fn attachment_name(title: &str, quality: &str, kind: Quality) -> String {
    let title: String = util::sanitize_filename(title)
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();

    if kind.is_audio() {
        return format!("{}.mp3", title);
    }

    let token = util::sanitize_filename_component(quality);
    format!("{}_{}p.mp4", title, token)
}

fn attachment(filename: &str) -> ContentDisposition {
    let mut parameters = vec![DispositionParam::Filename(filename.to_string())];
    if !filename.is_ascii() {
        parameters.push(DispositionParam::FilenameExt(ExtendedValue {
            charset: Charset::Ext(String::from("UTF-8")),
            language_tag: None,
            value: filename.as_bytes().to_vec(),
        }));
    }
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters,
    }
}

fn file_stream(mut file: File) -> impl Stream<Item = std::io::Result<Bytes>> {
    stream! {
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => yield Ok(Bytes::copy_from_slice(&buffer[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_validation() {
        assert_eq!(require_url(Some("  https://x.test/v  ")).unwrap(), "https://x.test/v");
        assert!(matches!(require_url(None), Err(AppError::Validation(m)) if m == "No URL provided"));
        assert!(matches!(require_url(Some("   ")), Err(AppError::Validation(m)) if m == "Empty URL provided"));
    }

    #[test]
    fn attachment_names() {
        assert_eq!(attachment_name("My: clip?", "audio", Quality::Audio), "My_ clip_.mp3");
        assert_eq!(attachment_name("Clip", "720", Quality::MaxHeight(720)), "Clip_720p.mp4");
        assert_eq!(attachment_name("Clip", "2160", Quality::Best), "Clip_2160p.mp4");
        assert_eq!(attachment_name("Clip", "best", Quality::Best), "Clip_bestp.mp4");
        assert_eq!(attachment_name("Clip", "../", Quality::Best), "Clip_..p.mp4");
        assert_eq!(attachment_name("line\nbreak", "360", Quality::MaxHeight(360)), "line_break_360p.mp4");
    }

    #[test]
    fn quality_accepts_strings_and_numbers() {
        let req: DownloadRequest = serde_json::from_value(serde_json::json!({"url": "u", "quality": 720})).unwrap();
        assert_eq!(req.quality.as_deref(), Some("720"));
        let req: DownloadRequest = serde_json::from_value(serde_json::json!({"url": "u", "quality": "audio"})).unwrap();
        assert_eq!(req.quality.as_deref(), Some("audio"));
        let req: DownloadRequest = serde_json::from_value(serde_json::json!({"url": "u", "quality": true})).unwrap();
        assert_eq!(req.quality, None);
        let req: DownloadRequest = serde_json::from_value(serde_json::json!({"url": "u"})).unwrap();
        assert_eq!(req.quality, None);
    }

    #[test]
    fn non_ascii_names_get_extended_parameter() {
        let cd = attachment("Café.mp3");
        assert_eq!(cd.disposition, DispositionType::Attachment);
        assert_eq!(cd.get_filename(), Some("Café.mp3"));
        assert!(cd.get_filename_ext().is_some());

        let cd = attachment("plain.mp4");
        assert!(cd.get_filename_ext().is_none());
    }
}
