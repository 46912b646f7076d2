use axum::{
    Json,
    body::Body,
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;

use crate::{delivery::DeliveryPayload, error::PipelineError, extractor::MediaMetadata};

pub const DESCRIPTION_TRANSPORT_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct DirectLinkBody {
    success: bool,
    video_url: String,
    title: String,
    duration: u64,
}

#[derive(Debug, Serialize)]
struct EncodedBody {
    success: bool,
    video_base64: String,
    title: String,
    duration: u64,
    filesize: usize,
}

/// Shapes the final artifact for transport. Only filenames ever cross this
/// boundary; scratch paths stay inside the pipeline.
pub fn render(payload: DeliveryPayload) -> Result<Response, PipelineError> {
    match payload {
        DeliveryPayload::DirectLink {
            remote_url,
            metadata,
        } => Ok(render_direct_link(remote_url, &metadata)),
        DeliveryPayload::Encoded { bytes, metadata } => Ok(render_encoded(&bytes, &metadata)),
        DeliveryPayload::Relay {
            bytes,
            content_type,
            filename,
        } => render_raw(bytes, content_type, &filename),
    }
}

fn render_direct_link(remote_url: String, metadata: &MediaMetadata) -> Response {
    Json(DirectLinkBody {
        success: true,
        video_url: remote_url,
        title: metadata.title.clone(),
        duration: metadata.duration,
    })
    .into_response()
}

fn render_encoded(bytes: &[u8], metadata: &MediaMetadata) -> Response {
    Json(encoded_body(bytes, metadata)).into_response()
}

/// The reported filesize is the raw byte count, never the encoded length.
fn encoded_body(bytes: &[u8], metadata: &MediaMetadata) -> EncodedBody {
    EncodedBody {
        success: true,
        video_base64: STANDARD.encode(bytes),
        title: metadata.title.clone(),
        duration: metadata.duration,
        filesize: bytes.len(),
    }
}

fn render_raw(
    bytes: Vec<u8>,
    content_type: &'static str,
    filename: &str,
) -> Result<Response, PipelineError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        CONTENT_LENGTH,
        HeaderValue::from_str(&bytes.len().to_string())
            .map_err(|_| PipelineError::internal("Could not build the download size header."))?,
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_str(&build_content_disposition(filename))
            .map_err(|_| PipelineError::internal("Could not build the download header."))?,
    );

    Ok((headers, Body::from(bytes)).into_response())
}

pub fn content_type_for_filename(filename: &str) -> &'static str {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{safe_ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let mut sanitized = String::with_capacity(value.len());

    for character in value.chars() {
        if character.is_ascii_alphanumeric()
            || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
        {
            sanitized.push(character);
        } else {
            sanitized.push('_');
        }
    }

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}

/// Transport truncation for long descriptions, char-boundary safe.
pub fn truncate_chars(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((index, _)) => value[..index].to_string(),
        None => value.to_string(),
    }
}
