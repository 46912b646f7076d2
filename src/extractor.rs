use std::{io::ErrorKind, path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{process::Command, time::timeout};
use tracing::debug;

use crate::error::PipelineError;

const SOCKET_TIMEOUT_SECONDS: u64 = 30;
const EXTRACTOR_RUN_TIMEOUT_SECONDS: u64 = 180;
const TITLE_PLACEHOLDER: &str = "Video";
const DEFAULT_CONTAINER: &str = "mp4";

/// Metadata record produced once per request by the extractor. Immutable
/// after construction.
#[derive(Debug, Clone)]
pub struct MediaMetadata {
    pub title: String,
    pub duration: u64,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub uploader: Option<String>,
    pub default_url: Option<String>,
    pub formats: Vec<StreamFormat>,
}

/// One candidate variant as reported by the extractor, in supplied order.
/// Later entries are higher-preference candidates during fallback scanning.
#[derive(Debug, Clone)]
pub struct StreamFormat {
    pub container: String,
    pub height: Option<u32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum DownloadIntent {
    MetadataOnly,
    Retrieve { dest: PathBuf, selector: String },
}

/// Boundary to the external extractor. Implementations resolve a URL into a
/// metadata record and, when the intent asks for it, materialize the chosen
/// stream's bytes at the given destination.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn resolve(
        &self,
        url: &str,
        intent: DownloadIntent,
    ) -> Result<MediaMetadata, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct ExtractorClient {
    run_timeout: Duration,
}

impl ExtractorClient {
    pub fn new() -> Self {
        Self {
            run_timeout: Duration::from_secs(EXTRACTOR_RUN_TIMEOUT_SECONDS),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<std::process::Output, PipelineError> {
        let command_future = Command::new("yt-dlp").args(args).output();
        let output = timeout(self.run_timeout, command_future)
            .await
            .map_err(|_| PipelineError::UpstreamTimeout)?
            .map_err(|error| {
                if error.kind() == ErrorKind::NotFound {
                    PipelineError::internal(
                        "yt-dlp is not installed on this system. Install yt-dlp and restart the service.",
                    )
                } else {
                    PipelineError::internal(format!("Could not execute yt-dlp: {error}"))
                }
            })?;

        if !output.status.success() {
            return Err(PipelineError::extraction(distill_stderr(&output.stderr)));
        }

        Ok(output)
    }
}

#[async_trait]
impl Extract for ExtractorClient {
    /// One invocation per request, no retries. A retrieval intent downloads
    /// and reports metadata in the same run.
    async fn resolve(
        &self,
        url: &str,
        intent: DownloadIntent,
    ) -> Result<MediaMetadata, PipelineError> {
        let mut args = vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            SOCKET_TIMEOUT_SECONDS.to_string(),
        ];

        if let DownloadIntent::Retrieve { dest, selector } = &intent {
            args.push("--no-simulate".to_string());
            args.push("-f".to_string());
            args.push(selector.clone());
            args.push("-o".to_string());
            args.push(dest.to_string_lossy().into_owned());
        }

        args.push(url.to_string());
        debug!("resolving {url:?} via yt-dlp");

        let output = self.run(args).await?;
        let info: RawInfo = serde_json::from_slice(&output.stdout).map_err(|error| {
            PipelineError::extraction(format!("Could not interpret extractor metadata: {error}"))
        })?;

        Ok(info.into_metadata())
    }
}

fn distill_stderr(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("the extractor could not complete the operation")
        .to_string()
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    url: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    ext: Option<String>,
    height: Option<u32>,
    url: Option<String>,
}

impl RawInfo {
    fn into_metadata(self) -> MediaMetadata {
        MediaMetadata {
            title: self
                .title
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            duration: self
                .duration
                .filter(|value| value.is_finite() && *value > 0.0)
                .map(|value| value as u64)
                .unwrap_or(0),
            thumbnail: self.thumbnail,
            description: self.description,
            uploader: self.uploader,
            default_url: self.url,
            formats: self
                .formats
                .into_iter()
                .map(|format| StreamFormat {
                    container: format
                        .ext
                        .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
                    height: format.height,
                    url: format.url,
                })
                .collect(),
        }
    }
}
