use std::path::Path;

use tracing::info;

use crate::{
    error::PipelineError,
    extractor::{DownloadIntent, Extract, MediaMetadata},
    respond,
    scratch::ScratchDir,
    selector::{self, FormatPolicy},
};

/// Delivery strategy for the download endpoint, selected per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    DirectLink,
    FetchAndRelay,
}

/// Exactly one of the three shapes is produced per request.
#[derive(Debug)]
pub enum DeliveryPayload {
    DirectLink {
        remote_url: String,
        metadata: MediaMetadata,
    },
    Encoded {
        bytes: Vec<u8>,
        metadata: MediaMetadata,
    },
    Relay {
        bytes: Vec<u8>,
        content_type: &'static str,
        filename: String,
    },
}

/// Direct-Link mode: no bytes cross this server, no local I/O.
pub async fn deliver_direct<E: Extract>(
    client: &E,
    url: &str,
    policy: &FormatPolicy,
) -> Result<DeliveryPayload, PipelineError> {
    let metadata = client.resolve(url, DownloadIntent::MetadataOnly).await?;

    let remote_url = selector::select_format(&metadata, policy, true)
        .and_then(|selection| selection.fetch_url().map(str::to_string))
        .ok_or_else(|| {
            PipelineError::unavailable(format!(
                "No downloadable format is available for {:?}.",
                metadata.title
            ))
        })?;

    Ok(DeliveryPayload::DirectLink {
        remote_url,
        metadata,
    })
}

pub async fn deliver_encoded<E: Extract>(
    client: &E,
    url: &str,
    policy: &FormatPolicy,
    scratch_root: &Path,
) -> Result<DeliveryPayload, PipelineError> {
    let (metadata, bytes, _filename) = fetch_and_relay(client, url, policy, scratch_root).await?;

    Ok(DeliveryPayload::Encoded { bytes, metadata })
}

pub async fn deliver_raw<E: Extract>(
    client: &E,
    url: &str,
    policy: &FormatPolicy,
    scratch_root: &Path,
) -> Result<DeliveryPayload, PipelineError> {
    let (_metadata, bytes, filename) = fetch_and_relay(client, url, policy, scratch_root).await?;
    let content_type = respond::content_type_for_filename(&filename);

    Ok(DeliveryPayload::Relay {
        bytes,
        content_type,
        filename,
    })
}

/// Fetch-and-Relay mode: retrieve the stream server-side into scratch
/// storage, then read the bytes back. The scratch directory is released on
/// every exit path.
pub async fn fetch_and_relay<E: Extract>(
    client: &E,
    url: &str,
    policy: &FormatPolicy,
    scratch_root: &Path,
) -> Result<(MediaMetadata, Vec<u8>, String), PipelineError> {
    let scratch = ScratchDir::acquire(scratch_root).await?;
    let outcome = retrieve_into(client, url, policy, &scratch).await;
    scratch.release().await;

    outcome
}

async fn retrieve_into<E: Extract>(
    client: &E,
    url: &str,
    policy: &FormatPolicy,
    scratch: &ScratchDir,
) -> Result<(MediaMetadata, Vec<u8>, String), PipelineError> {
    let expected_name = format!("video.{}", policy.preferred_container);
    let metadata = client
        .resolve(
            url,
            DownloadIntent::Retrieve {
                dest: scratch.path().join(&expected_name),
                selector: policy.download_selector(),
            },
        )
        .await?;

    let artifact = scratch
        .locate(&expected_name, policy.preferred_container)
        .await
        .ok_or(PipelineError::ArtifactNotProduced)?;

    let bytes = tokio::fs::read(&artifact).await.map_err(|error| {
        PipelineError::internal(format!("Could not read the retrieved file: {error}"))
    })?;

    let filename = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or(expected_name);

    info!(
        "retrieved {:?} ({} bytes) for {url:?}",
        metadata.title,
        bytes.len()
    );

    Ok((metadata, bytes, filename))
}
