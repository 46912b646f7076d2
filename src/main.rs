mod delivery;
mod error;
mod extractor;
mod respond;
mod scratch;
mod selector;

use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::State,
    response::Response,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use url::Url;

use crate::{
    delivery::DeliveryMode,
    error::PipelineError,
    extractor::{DownloadIntent, Extract, ExtractorClient},
    selector::FormatPolicy,
};

const FORMAT_POLICY: FormatPolicy = FormatPolicy {
    preferred_container: "mp4",
    max_height: Some(720),
};
const DELIVERY_MODE: DeliveryMode = DeliveryMode::FetchAndRelay;
const DEFAULT_PORT: u16 = 8000;

#[derive(Clone)]
struct AppState {
    extractor: ExtractorClient,
    policy: FormatPolicy,
    mode: DeliveryMode,
    scratch_root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct VideoRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct InfoBody {
    success: bool,
    title: String,
    duration: u64,
    thumbnail: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "vidrelay=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), PipelineError> {
    let scratch_root = std::env::temp_dir().join("vidrelay-scratch");
    tokio::fs::create_dir_all(&scratch_root)
        .await
        .map_err(|error| {
            PipelineError::internal(format!("Could not create the scratch root: {error}"))
        })?;
    scratch::sweep_scratch_root(&scratch_root).await;

    let state = AppState {
        extractor: ExtractorClient::new(),
        policy: FORMAT_POLICY,
        mode: DELIVERY_MODE,
        scratch_root,
    };

    let app = Router::new()
        .route("/", get(identity))
        .route("/info", post(video_info))
        .route("/download", post(download))
        .route("/download-file", post(download_file))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = resolve_bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| PipelineError::internal(format!("Could not bind {addr}: {error}")))?;

    info!("vidrelay listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|error| PipelineError::internal(format!("HTTP server error: {error}")))
}

fn resolve_bind_addr() -> String {
    match std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
    {
        Some(port) => format!("0.0.0.0:{port}"),
        None => format!("127.0.0.1:{DEFAULT_PORT}"),
    }
}

async fn identity() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "service": "vidrelay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn video_info(
    State(state): State<AppState>,
    Json(payload): Json<VideoRequest>,
) -> Result<Json<InfoBody>, PipelineError> {
    let url = validated_url(&payload.url)?;
    let metadata = state
        .extractor
        .resolve(&url, DownloadIntent::MetadataOnly)
        .await?;

    Ok(Json(InfoBody {
        success: true,
        title: metadata.title,
        duration: metadata.duration,
        thumbnail: metadata.thumbnail,
        description: metadata
            .description
            .map(|text| respond::truncate_chars(&text, respond::DESCRIPTION_TRANSPORT_LIMIT)),
        uploader: metadata.uploader,
    }))
}

async fn download(
    State(state): State<AppState>,
    Json(payload): Json<VideoRequest>,
) -> Result<Response, PipelineError> {
    let url = validated_url(&payload.url)?;

    let delivered = match state.mode {
        DeliveryMode::DirectLink => {
            delivery::deliver_direct(&state.extractor, &url, &state.policy).await?
        }
        DeliveryMode::FetchAndRelay => {
            delivery::deliver_encoded(&state.extractor, &url, &state.policy, &state.scratch_root)
                .await?
        }
    };

    respond::render(delivered)
}

async fn download_file(
    State(state): State<AppState>,
    Json(payload): Json<VideoRequest>,
) -> Result<Response, PipelineError> {
    let url = validated_url(&payload.url)?;
    let delivered =
        delivery::deliver_raw(&state.extractor, &url, &state.policy, &state.scratch_root).await?;

    respond::render(delivered)
}

fn validated_url(input: &str) -> Result<String, PipelineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::extraction("Enter a video URL."));
    }

    let parsed =
        Url::parse(trimmed).map_err(|_| PipelineError::extraction("The URL is not valid."))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(PipelineError::extraction(
            "Only http(s) video URLs are supported.",
        ));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_trimmed_and_validated() {
        assert_eq!(
            validated_url("  https://example.test/v  ").unwrap(),
            "https://example.test/v"
        );
        assert!(validated_url("").is_err());
        assert!(validated_url("   ").is_err());
        assert!(validated_url("not a url").is_err());
        assert!(validated_url("ftp://example.test/v").is_err());
        assert!(validated_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn deployed_download_mode_is_fetch_and_relay() {
        assert_eq!(DELIVERY_MODE, DeliveryMode::FetchAndRelay);
        assert_ne!(DELIVERY_MODE, DeliveryMode::DirectLink);
    }

    #[tokio::test]
    async fn identity_reports_the_service() {
        let Json(value) = identity().await;
        assert_eq!(value["status"], "online");
        assert_eq!(value["service"], "vidrelay");
    }
}
