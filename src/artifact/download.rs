use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_TYPE;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Retrieves the bytes behind a direct-download URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Writes the resource to `dest`, returning the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Cached,
    Fetched { bytes: u64 },
}

/// Downloads `url` to `dest` unless `dest` already exists and `force` is off.
pub async fn ensure_downloaded(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    force: bool,
) -> Result<DownloadOutcome> {
    if !force && dest.exists() {
        tracing::debug!("Using cached artifact {:?}", dest);
        return Ok(DownloadOutcome::Cached);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await?;
    }

    tracing::info!("Downloading {} -> {:?}", url, dest);
    let bytes = fetcher.fetch(url, dest).await?;
    tracing::info!("Downloaded {} bytes", bytes);

    Ok(DownloadOutcome::Fetched { bytes })
}

/// Streams downloads over HTTP with a terminal progress bar.
pub struct HttpFetcher {
    client: reqwest::Client,
    quiet: bool,
}

impl HttpFetcher {
    pub fn new(quiet: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("forest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;

        Ok(Self { client, quiet })
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                ) {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        }
    }

    async fn stream_to(&self, response: reqwest::Response, part_path: &Path, url: &str) -> Result<u64> {
        let bar = self.progress_bar(response.content_length());
        let mut file = fs::File::create(part_path).await?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::DownloadFailed(format!("{}: {}", url, e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }

        file.flush().await?;
        bar.finish_and_clear();
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DownloadFailed(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::DownloadFailed(format!(
                "{}: HTTP {}",
                url,
                response.status()
            )));
        }

        // The host answers with an HTML page for private files and for large
        // files that need an interactive confirmation.
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        if is_html {
            return Err(Error::DownloadFailed(format!(
                "{}: received an HTML page instead of the file (is the link public?)",
                url
            )));
        }

        let part_path = part_path(dest);
        let written = match self.stream_to(response, &part_path, url).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&part_path, dest).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(e.into());
        }
        Ok(written)
    }
}

/// `model.zip` downloads into `model.zip.part`.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
