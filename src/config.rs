use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,

    // Temp files land here as allvideosaver_<token>.<ext> until cleanup removes them.
    pub download_dir: PathBuf,
    pub static_dir: PathBuf,
    pub cleanup_delay: Duration,

    pub ytdlp_bin: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_location: Option<PathBuf>,
    // Preferred: explicit yt-dlp proxy (e.g. socks5://127.0.0.1:7890).
    pub ytdlp_proxy: Option<String>,
    // Whether to let yt-dlp inherit http_proxy/https_proxy from the service environment.
    pub inherit_proxy_env: bool,
}

#[derive(Debug, Default, Deserialize)]
struct AppConfigFile {
    listen_addr: Option<String>,

    download_dir: Option<String>,
    static_dir: Option<String>,
    cleanup_delay_secs: Option<u64>,

    ytdlp_bin: Option<String>,
    ytdlp_path: Option<String>,
    ffmpeg_location: Option<String>,
    ytdlp_proxy: Option<String>,
    inherit_proxy_env: Option<bool>,
}

fn default_ytdlp_path() -> String {
    // Prefer inheriting PATH from the service process; override via config.toml when needed.
    std::env::var("PATH").unwrap_or_else(|_| {
        "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin".to_string()
    })
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("allvideosaver")
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    })
}

/// Common ffmpeg install locations, checked when none is configured.
const FFMPEG_CANDIDATES: &[&str] = &["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"];

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file: {}",
                path.to_string_lossy().as_ref()
            )
        })?;

        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: AppConfigFile = toml::from_str(raw).context("Failed to parse config.toml")?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: AppConfigFile) -> Self {
        Self {
            listen_addr: file.listen_addr.unwrap_or_else(|| "0.0.0.0:5000".to_string()),

            download_dir: non_empty(file.download_dir)
                .map(PathBuf::from)
                .unwrap_or_else(default_download_dir),
            static_dir: PathBuf::from(non_empty(file.static_dir).unwrap_or_else(|| "static".to_string())),
            cleanup_delay: Duration::from_secs(file.cleanup_delay_secs.unwrap_or(60)),

            ytdlp_bin: PathBuf::from(file.ytdlp_bin.unwrap_or_else(|| "yt-dlp".to_string())),
            ytdlp_path: file.ytdlp_path.unwrap_or_else(default_ytdlp_path),
            ffmpeg_location: non_empty(file.ffmpeg_location).map(PathBuf::from),
            ytdlp_proxy: non_empty(file.ytdlp_proxy),
            inherit_proxy_env: file.inherit_proxy_env.unwrap_or(false),
        }
    }

    /// Create the working directories and resolve where ffmpeg lives.
    ///
    /// A configured `ffmpeg_location` must exist. Without one, the usual install
    /// locations are probed; if nothing is found yt-dlp falls back to its own lookup.
    pub fn prepare(&mut self) -> Result<()> {
        fs::create_dir_all(&self.download_dir).with_context(|| {
            format!("Failed to create download_dir: {}", self.download_dir.display())
        })?;
        fs::create_dir_all(&self.static_dir).with_context(|| {
            format!("Failed to create static_dir: {}", self.static_dir.display())
        })?;

        match &self.ffmpeg_location {
            Some(p) if !p.exists() => {
                return Err(anyhow!("ffmpeg_location does not exist: {}", p.display()));
            }
            Some(_) => {}
            None => {
                self.ffmpeg_location = FFMPEG_CANDIDATES
                    .iter()
                    .map(PathBuf::from)
                    .find(|p| p.exists());
                if self.ffmpeg_location.is_none() {
                    log::warn!("ffmpeg not found; audio extraction and stream merging may fail");
                }
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(AppConfigFile::default())
    }
}
