use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failure taxonomy of the resolution/delivery pipeline. Every variant is
/// recovered at the request boundary and rendered as a structured body; none
/// of them may take the process down.
#[derive(Debug)]
pub enum PipelineError {
    ExtractionFailed(String),
    FormatUnavailable(String),
    ArtifactNotProduced,
    UpstreamTimeout,
    Internal(String),
}

#[derive(Debug, Serialize)]
struct FailureBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl PipelineError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::FormatUnavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::ExtractionFailed(_) => StatusCode::BAD_REQUEST,
            Self::FormatUnavailable(_) => StatusCode::NOT_FOUND,
            Self::ArtifactNotProduced => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::ExtractionFailed(message)
            | Self::FormatUnavailable(message)
            | Self::Internal(message) => message.clone(),
            Self::ArtifactNotProduced => {
                "The extractor reported success but produced no retrievable file.".to_string()
            }
            Self::UpstreamTimeout => {
                "The upstream fetch exceeded the time limit. Try again with another URL."
                    .to_string()
            }
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            Self::ExtractionFailed(_) => Some("EXTRACTION_FAILED"),
            Self::FormatUnavailable(_) => Some("FORMAT_UNAVAILABLE"),
            Self::ArtifactNotProduced => Some("ARTIFACT_NOT_PRODUCED"),
            Self::UpstreamTimeout => Some("UPSTREAM_TIMEOUT"),
            Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = Json(FailureBody {
            success: false,
            error: self.message(),
            code: self.code(),
        });

        (self.status(), body).into_response()
    }
}
