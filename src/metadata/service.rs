//! HTTP service hosting an `InMemoryMetadataStore`.
//!
//! Run by the `metastore` subcommand so several node processes can share one store.

use super::memory::InMemoryMetadataStore;
use super::protocol::*;
use super::store::{MetadataError, MetadataStore};
use super::types::Lease;
use crate::codec::encode_frame;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use futures::{StreamExt, future};
use std::time::Duration;

pub struct ServiceError(MetadataError);

impl From<MetadataError> for ServiceError {
    fn from(e: MetadataError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            MetadataError::LeaseNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!("Metadata request failed: {}", self.0);
        (
            status,
            Json(ErrorResponse {
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(store: InMemoryMetadataStore) -> Router {
    Router::new()
        .route(ENDPOINT_RANGE, post(handle_range))
        .route(ENDPOINT_PUT, post(handle_put))
        .route(ENDPOINT_CAS, post(handle_cas))
        .route(ENDPOINT_DELETE, post(handle_delete))
        .route(ENDPOINT_LEASE_GRANT, post(handle_lease_grant))
        .route(ENDPOINT_WATCH, post(handle_watch))
        .layer(Extension(store))
}

pub async fn handle_range(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<RangeRequest>,
) -> Result<Json<RangeResponse>, ServiceError> {
    let kvs = if req.prefix {
        store.get_prefix(&req.key).await?
    } else {
        store.get(&req.key).await?
    };
    Ok(Json(RangeResponse { kvs }))
}

pub async fn handle_put(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>, ServiceError> {
    let version = match req.lease {
        Some(lease) => store.put_with_lease(&req.key, req.value, lease).await?,
        None => store.put(&req.key, req.value).await?,
    };
    Ok(Json(PutResponse { version }))
}

pub async fn handle_cas(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<CasRequest>,
) -> Result<Json<CasResponse>, ServiceError> {
    let succeeded = store
        .compare_and_put(&req.key, req.value, req.expected_version)
        .await?;
    Ok(Json(CasResponse { succeeded }))
}

pub async fn handle_delete(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ServiceError> {
    let deleted = store.delete(&req.key).await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn handle_lease_grant(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<LeaseGrantRequest>,
) -> Result<Json<Lease>, ServiceError> {
    let lease = store
        .grant_lease(Duration::from_millis(req.ttl_ms))
        .await?;
    Ok(Json(lease))
}

/// Streams watch events until the watcher falls behind; the client then re-subscribes.
pub async fn handle_watch(
    Extension(store): Extension<InMemoryMetadataStore>,
    Json(req): Json<WatchRequest>,
) -> Result<Response, ServiceError> {
    let prefix = req.prefix;
    let events = store.watch_prefix(&prefix).await?;
    tracing::debug!("Watch opened on {}", prefix);

    let frames = events
        .take_while(move |event| {
            if let Err(e) = event {
                tracing::warn!("Closing watch on {}: {}", prefix, e);
            }
            future::ready(event.is_ok())
        })
        .filter_map(|event| future::ready(event.ok()))
        .map(|event| encode_frame(&event));

    Ok(Body::from_stream(frames).into_response())
}
