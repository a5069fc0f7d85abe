use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Extension, Path},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use futures::StreamExt;
use std::sync::Arc;

use super::error::ChunkServerError;
use super::protocol::{
    ENDPOINT_FILE, ENDPOINT_FILES, ENDPOINT_INTERNAL_CHUNK, FileChunkData, GenericResponse,
};
use super::service::ChunkServer;
use super::types::FileRecord;
use crate::codec::{decode_frames, encode_frame};

pub fn router(server: Arc<ChunkServer>) -> Router {
    let body_limit = server.config().max_frame_len();

    Router::new()
        .route(ENDPOINT_FILES, post(handle_create_file))
        .route(ENDPOINT_FILE, get(handle_read_file).delete(handle_remove_file))
        .route(
            ENDPOINT_INTERNAL_CHUNK,
            put(handle_push_chunk).delete(handle_delete_chunk),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(server))
}

pub async fn handle_create_file(
    Extension(server): Extension<Arc<ChunkServer>>,
    body: Body,
) -> Result<Json<FileRecord>, ChunkServerError> {
    let max_frame_len = server.config().max_frame_len();
    let messages = decode_frames::<FileChunkData, _, _>(body.into_data_stream(), max_frame_len);

    let file = server.create_file(messages).await?;
    Ok(Json(file))
}

pub async fn handle_read_file(
    Extension(server): Extension<Arc<ChunkServer>>,
    Path(file_id): Path<String>,
) -> Result<Response, ChunkServerError> {
    let file = server.open_file(&file_id).await?;
    tracing::debug!("Streaming file {} ({} chunks)", file.id, file.chunks.len());

    let frames = server.stream_file(file).map(move |message| match message {
        Ok(message) => encode_frame(&message).map_err(ChunkServerError::from),
        Err(e) => {
            tracing::error!("Aborting read of file {}: {}", file_id, e);
            Err(e)
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(frames),
    )
        .into_response())
}

pub async fn handle_remove_file(
    Extension(server): Extension<Arc<ChunkServer>>,
    Path(file_id): Path<String>,
) -> Result<Json<GenericResponse>, ChunkServerError> {
    Ok(Json(server.remove_file(&file_id).await?))
}

pub async fn handle_push_chunk(
    Extension(server): Extension<Arc<ChunkServer>>,
    Path(chunk_id): Path<String>,
    body: Bytes,
) -> Result<Json<GenericResponse>, ChunkServerError> {
    Ok(Json(server.push_chunk(&chunk_id, &body).await?))
}

pub async fn handle_delete_chunk(
    Extension(server): Extension<Arc<ChunkServer>>,
    Path(chunk_id): Path<String>,
) -> Result<Json<GenericResponse>, ChunkServerError> {
    Ok(Json(server.delete_chunk(&chunk_id).await?))
}
