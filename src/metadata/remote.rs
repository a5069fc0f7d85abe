//! HTTP client for the metadata service.
//!
//! Requests go to the first endpoint; a transport failure moves on to the next one.
//! Non-2xx answers are returned as `MetadataError::Remote` without failing over,
//! since the service did receive and judge the request.

use super::protocol::*;
use super::store::{MetadataError, MetadataResult, MetadataStore, WatchStream};
use super::types::{KeyValue, Lease, LeaseId, WatchEvent};
use crate::codec::decode_frames;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct HttpMetadataStore {
    endpoints: Vec<String>,
    http_client: reqwest::Client,
}

impl HttpMetadataStore {
    pub fn new(endpoints: &[String]) -> MetadataResult<Self> {
        if endpoints.is_empty() {
            return Err(MetadataError::Unavailable(
                "no metadata endpoints configured".to_string(),
            ));
        }

        Ok(Self {
            endpoints: endpoints.iter().map(|e| normalize_endpoint(e)).collect(),
            http_client: reqwest::Client::new(),
        })
    }

    async fn send(&self, path: &str, payload: &impl Serialize) -> MetadataResult<reqwest::Response> {
        let mut last_error = None;

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint, path);
            match self.http_client.post(&url).json(payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = match resp.json::<ErrorResponse>().await {
                        Ok(body) => body.message,
                        Err(_) => "no error body".to_string(),
                    };
                    return Err(MetadataError::Remote { status, message });
                }
                Err(e) => {
                    tracing::warn!("Metadata endpoint {} unreachable: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(MetadataError::Transport(e)),
            None => Err(MetadataError::Unavailable(
                "no metadata endpoints configured".to_string(),
            )),
        }
    }

    async fn call<Req, Resp>(&self, path: &str, payload: &Req) -> MetadataResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let resp = self.send(path, payload).await?;
        Ok(resp.json().await?)
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    async fn get(&self, key: &str) -> MetadataResult<Vec<KeyValue>> {
        let resp: RangeResponse = self
            .call(
                ENDPOINT_RANGE,
                &RangeRequest {
                    key: key.to_string(),
                    prefix: false,
                },
            )
            .await?;
        Ok(resp.kvs)
    }

    async fn get_prefix(&self, prefix: &str) -> MetadataResult<Vec<KeyValue>> {
        let resp: RangeResponse = self
            .call(
                ENDPOINT_RANGE,
                &RangeRequest {
                    key: prefix.to_string(),
                    prefix: true,
                },
            )
            .await?;
        Ok(resp.kvs)
    }

    async fn put(&self, key: &str, value: String) -> MetadataResult<u64> {
        let resp: PutResponse = self
            .call(
                ENDPOINT_PUT,
                &PutRequest {
                    key: key.to_string(),
                    value,
                    lease: None,
                },
            )
            .await?;
        Ok(resp.version)
    }

    async fn put_with_lease(
        &self,
        key: &str,
        value: String,
        lease: LeaseId,
    ) -> MetadataResult<u64> {
        let resp: PutResponse = self
            .call(
                ENDPOINT_PUT,
                &PutRequest {
                    key: key.to_string(),
                    value,
                    lease: Some(lease),
                },
            )
            .await?;
        Ok(resp.version)
    }

    async fn compare_and_put(
        &self,
        key: &str,
        value: String,
        expected_version: u64,
    ) -> MetadataResult<bool> {
        let resp: CasResponse = self
            .call(
                ENDPOINT_CAS,
                &CasRequest {
                    key: key.to_string(),
                    value,
                    expected_version,
                },
            )
            .await?;
        Ok(resp.succeeded)
    }

    async fn delete(&self, key: &str) -> MetadataResult<bool> {
        let resp: DeleteResponse = self
            .call(
                ENDPOINT_DELETE,
                &DeleteRequest {
                    key: key.to_string(),
                },
            )
            .await?;
        Ok(resp.deleted)
    }

    async fn grant_lease(&self, ttl: Duration) -> MetadataResult<Lease> {
        self.call(
            ENDPOINT_LEASE_GRANT,
            &LeaseGrantRequest {
                ttl_ms: ttl.as_millis() as u64,
            },
        )
        .await
    }

    async fn watch_prefix(&self, prefix: &str) -> MetadataResult<WatchStream> {
        let resp = self
            .send(
                ENDPOINT_WATCH,
                &WatchRequest {
                    prefix: prefix.to_string(),
                },
            )
            .await?;

        let events = decode_frames::<WatchEvent, _, _>(resp.bytes_stream(), MAX_WATCH_FRAME)
            .map_err(MetadataError::from);
        Ok(events.boxed())
    }
}
