use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::formats::Quality;
use crate::models::MediaInfo;

const FILE_PREFIX: &str = "allvideosaver_";
const STDERR_TAIL_LINES: usize = 50;

/// One download request: where yt-dlp writes and what it should fetch.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    pub quality: String,
    /// Unique file stem; yt-dlp appends the extension.
    pub stem: String,
    pub output_dir: PathBuf,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, quality: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            stem: format!("{}{}", FILE_PREFIX, uuid::Uuid::new_v4().simple()),
            output_dir: output_dir.into(),
        }
    }

    pub fn kind(&self) -> Quality {
        Quality::parse(&self.quality)
    }

    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(format!("{}.%(ext)s", self.stem))
    }
}

/// Result of a finished download.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub info: MediaInfo,
    pub path: PathBuf,
}

/// The external extraction tool, behind a seam so handlers can be tested without it.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Metadata only; nothing is written to disk.
    async fn probe(&self, url: &str) -> Result<MediaInfo>;

    /// Download (and for audio, transcode) into the job's output directory.
    async fn download(&self, job: &DownloadJob) -> Result<Downloaded>;
}

/// Runs the yt-dlp binary as a child process.
pub struct YtDlp {
    config: Arc<AppConfig>,
}

impl YtDlp {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    fn base_command(&self) -> Command {
        let cfg = self.config.as_ref();
        let mut cmd = Command::new(&cfg.ytdlp_bin);
        cmd.env("PATH", &cfg.ytdlp_path);

        if !cfg.inherit_proxy_env {
            // Avoid being accidentally bound to a dead local proxy (common in shell env).
            cmd.env_remove("http_proxy")
                .env_remove("https_proxy")
                .env_remove("HTTP_PROXY")
                .env_remove("HTTPS_PROXY")
                .env_remove("no_proxy")
                .env_remove("NO_PROXY");
        }

        if let Some(p) = &cfg.ytdlp_proxy {
            cmd.arg("--proxy").arg(p);
        }
        if let Some(ffmpeg) = &cfg.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }

        cmd.arg("--no-playlist").arg("--no-cache-dir").arg("--no-warnings");
        cmd
    }

    fn probe_command(&self, url: &str) -> Command {
        let mut cmd = self.base_command();
        cmd.arg("--dump-single-json").arg("--").arg(url);
        cmd
    }

    fn download_command(&self, job: &DownloadJob) -> Command {
        let kind = job.kind();
        let mut cmd = self.base_command();
        cmd.arg("--no-part")
            .arg("-o")
            .arg(job.output_template())
            .arg("-f")
            .arg(kind.format_selector());

        if kind.is_audio() {
            cmd.arg("--extract-audio")
                .arg("--audio-format")
                .arg("mp3")
                .arg("--audio-quality")
                .arg("192K");
        } else {
            cmd.arg("--merge-output-format").arg("mp4");
        }

        // Download for real but still print the final info dict (with requested_downloads).
        cmd.arg("--no-simulate")
            .arg("--dump-single-json")
            .arg("--")
            .arg(&job.url);
        cmd
    }

    async fn run_json(&self, mut cmd: Command, tag: &str) -> Result<MediaInfo> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::Extraction(format!("Failed to start yt-dlp: {}", e)))?;
        if let Some(pid) = child.id() {
            log::info!("[{}] yt-dlp started (pid={})", tag, pid);
        }

        // Capture stderr so we can return a useful error if yt-dlp fails.
        let tail_buf: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = tail_buf.clone();
            let tag = tag.to_string();
            tokio::spawn(async move { collect_stderr(stderr, buf, tag).await })
        });

        let out = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::Extraction(format!("Failed waiting for yt-dlp: {}", e)))?;
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        if !out.status.success() {
            let tail = render_tail(&tail_buf).await;
            return Err(AppError::Extraction(format!(
                "yt-dlp exited with error (status={}): {}",
                out.status, tail
            )));
        }

        serde_json::from_slice(&out.stdout)
            .map_err(|e| AppError::Extraction(format!("Failed to parse yt-dlp JSON: {}", e)))
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo> {
        self.run_json(self.probe_command(url), "INFO").await
    }

    async fn download(&self, job: &DownloadJob) -> Result<Downloaded> {
        let info = self.run_json(self.download_command(job), "DOWNLOAD").await?;
        let path = locate_output(job, &info).await?;
        Ok(Downloaded { info, path })
    }
}

async fn collect_stderr(stderr: tokio::process::ChildStderr, buf: Arc<Mutex<VecDeque<String>>>, tag: String) {
    let mut r = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match r.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let l = line.trim_end().to_string();
                if !l.is_empty() {
                    log::debug!("[{}] {}", tag, l);
                    let mut g = buf.lock().await;
                    if g.len() >= STDERR_TAIL_LINES {
                        g.pop_front();
                    }
                    g.push_back(l);
                }
            }
            Err(_) => break,
        }
    }
}

async fn render_tail(buf: &Mutex<VecDeque<String>>) -> String {
    let g = buf.lock().await;
    if g.is_empty() {
        return "no stderr output captured".to_string();
    }
    g.iter().cloned().collect::<Vec<_>>().join("\n")
}

/// Find the file yt-dlp produced for `job`.
///
/// Prefers the path yt-dlp reports after post-processing; otherwise scans the
/// output directory for the job's stem (mp3 first for audio jobs).
pub async fn locate_output(job: &DownloadJob, info: &MediaInfo) -> Result<PathBuf> {
    for reported in info.requested_downloads.iter().filter_map(|d| d.path()) {
        if tokio::fs::metadata(&reported).await.map(|m| m.is_file()).unwrap_or(false) {
            return Ok(reported);
        }
    }

    let mut candidates = Vec::new();
    let mut entries = tokio::fs::read_dir(&job.output_dir)
        .await
        .map_err(|e| AppError::Extraction(format!("Failed to read download dir: {}", e)))?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let p = entry.path();
        let matches_stem = p
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s == job.stem)
            .unwrap_or(false);
        if matches_stem && !is_intermediate(&p) {
            candidates.push(p);
        }
    }

    let wanted_ext = if job.kind().is_audio() { "mp3" } else { "mp4" };
    candidates.sort_by_key(|p| !has_extension(p, wanted_ext));
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Extraction("Download finished but no output file was found".to_string()))
}

fn has_extension(p: &Path, ext: &str) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn is_intermediate(p: &Path) -> bool {
    ["part", "ytdl", "temp"].iter().any(|ext| has_extension(p, ext))
}
