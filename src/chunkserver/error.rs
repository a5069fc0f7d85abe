use super::protocol::GenericResponse;
use crate::codec::CodecError;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkServerError {
    #[error("write failure: {0}")]
    WriteFailure(String),

    #[error("metadata sync failure: {0}")]
    MetadataSyncFailure(String),

    #[error("metadata read failure: {0}")]
    MetadataReadFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("chunk unavailable: {0}")]
    ChunkUnavailable(String),

    /// An upload message larger than the chunk capacity.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream framing error: {0}")]
    Codec(#[from] CodecError),

    #[error("remote error ({code}): {message}")]
    Remote { code: i32, message: String },
}

pub type Result<T> = std::result::Result<T, ChunkServerError>;

impl ChunkServerError {
    /// Wire code carried in `GenericResponse::code`. Zero is success.
    pub fn code(&self) -> i32 {
        match self {
            Self::WriteFailure(_) => 1,
            Self::MetadataSyncFailure(_) => 2,
            Self::MetadataReadFailure(_) => 3,
            Self::NotFound(_) => 4,
            Self::CorruptMetadata(_) => 5,
            Self::Transport(_) | Self::Codec(_) => 6,
            Self::Remote { code, .. } => *code,
            Self::PayloadTooLarge(_) => 7,
            Self::ChunkUnavailable(_) => 8,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Transport(_) | Self::Codec(_) | Self::Remote { .. } => StatusCode::BAD_GATEWAY,
            Self::ChunkUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::WriteFailure(_)
            | Self::MetadataSyncFailure(_)
            | Self::MetadataReadFailure(_)
            | Self::CorruptMetadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuilds an error from a failed reply so callers see the server's kind.
    pub fn from_response(resp: GenericResponse) -> Self {
        let GenericResponse { code, message } = resp;
        match code {
            1 => Self::WriteFailure(message),
            2 => Self::MetadataSyncFailure(message),
            3 => Self::MetadataReadFailure(message),
            4 => Self::NotFound(message),
            5 => Self::CorruptMetadata(message),
            7 => Self::PayloadTooLarge(message),
            8 => Self::ChunkUnavailable(message),
            code => Self::Remote { code, message },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::WriteFailure(m)
            | Self::MetadataSyncFailure(m)
            | Self::MetadataReadFailure(m)
            | Self::NotFound(m)
            | Self::CorruptMetadata(m)
            | Self::ChunkUnavailable(m)
            | Self::PayloadTooLarge(m) => m.clone(),
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChunkServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = GenericResponse {
            code: self.code(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
