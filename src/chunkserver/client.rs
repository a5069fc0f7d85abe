//! HTTP clients for the chunk server surface.
//!
//! `ChunkServerClient` speaks to one node and covers every call. `PeerClient` is the
//! narrow node-to-node view (push and delete a replica) used by the remove path and
//! the sync job; `HttpPeerClient` implements it over a shared connection pool.

use super::error::{ChunkServerError, Result};
use super::protocol::{ENDPOINT_FILES, FileChunkData, GenericResponse, file_path, internal_chunk_path};
use super::types::FileRecord;
use crate::codec::{decode_frames, encode_frame};
use crate::config::{DEFAULT_CHUNK_CAPACITY, FRAME_OVERHEAD};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};

pub struct ChunkServerClient {
    base_url: String,
    http_client: reqwest::Client,
    max_frame_len: usize,
}

impl ChunkServerClient {
    pub fn new(addr: &str) -> Self {
        Self::with_client(reqwest::Client::new(), addr)
    }

    pub fn with_client(http_client: reqwest::Client, addr: &str) -> Self {
        let trimmed = addr.trim_end_matches('/');
        let base_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        Self {
            base_url,
            http_client,
            max_frame_len: DEFAULT_CHUNK_CAPACITY + FRAME_OVERHEAD,
        }
    }

    /// Largest download frame accepted; match it to the server's chunk capacity.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Passes 2xx responses through and turns anything else into the server's error.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        match resp.json::<GenericResponse>().await {
            Ok(body) => Err(ChunkServerError::from_response(body)),
            Err(_) => Err(ChunkServerError::Remote {
                code: i32::from(status.as_u16()),
                message: status.to_string(),
            }),
        }
    }

    /// Streams one chunk per message. Every payload must fit the server's chunk capacity.
    pub async fn create_file<S>(&self, messages: S) -> Result<FileRecord>
    where
        S: Stream<Item = FileChunkData> + Send + Sync + 'static,
    {
        let frames = messages.map(|message| encode_frame(&message));
        let resp = self
            .http_client
            .post(self.url(ENDPOINT_FILES))
            .body(reqwest::Body::wrap_stream(frames))
            .send()
            .await?;

        Ok(Self::check(resp).await?.json().await?)
    }

    /// Splits `data` into `chunk_capacity`-sized messages and uploads them.
    /// Empty input still sends one empty message so the file keeps its name.
    pub async fn upload(
        &self,
        file_name: &str,
        data: &[u8],
        chunk_capacity: usize,
    ) -> Result<FileRecord> {
        let mut messages: Vec<FileChunkData> = data
            .chunks(chunk_capacity.max(1))
            .map(|piece| FileChunkData {
                payload: piece.to_vec(),
                file_name: file_name.to_string(),
            })
            .collect();

        if messages.is_empty() {
            messages.push(FileChunkData {
                payload: Vec::new(),
                file_name: file_name.to_string(),
            });
        }

        self.create_file(stream::iter(messages)).await
    }

    /// Opens a download. Lookup failures surface here; read failures end the stream with an error.
    pub async fn read_file(
        &self,
        file_id: &str,
    ) -> Result<BoxStream<'static, Result<FileChunkData>>> {
        let resp = self.http_client.get(self.url(&file_path(file_id))).send().await?;
        let resp = Self::check(resp).await?;

        Ok(
            decode_frames::<FileChunkData, _, _>(resp.bytes_stream(), self.max_frame_len)
                .map_err(ChunkServerError::from)
                .boxed(),
        )
    }

    /// Downloads a whole file into memory, returning its name and bytes.
    pub async fn download(&self, file_id: &str) -> Result<(String, Vec<u8>)> {
        let mut messages = self.read_file(file_id).await?;
        let mut name = String::new();
        let mut data = Vec::new();

        while let Some(message) = messages.try_next().await? {
            data.extend_from_slice(&message.payload);
            name = message.file_name;
        }
        Ok((name, data))
    }

    pub async fn remove_file(&self, file_id: &str) -> Result<GenericResponse> {
        let resp = self
            .http_client
            .delete(self.url(&file_path(file_id)))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn push_chunk(
        &self,
        chunk_id: &str,
        data: impl Into<Bytes>,
    ) -> Result<GenericResponse> {
        let data: Bytes = data.into();
        let resp = self
            .http_client
            .put(self.url(&internal_chunk_path(chunk_id)))
            .body(data)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn delete_chunk(&self, chunk_id: &str) -> Result<GenericResponse> {
        let resp = self
            .http_client
            .delete(self.url(&internal_chunk_path(chunk_id)))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

/// Node-to-node replica operations, addressed by advertised address.
#[async_trait]
pub trait PeerClient: Send + Sync + 'static {
    async fn push_chunk(&self, addr: &str, chunk_id: &str, data: Bytes) -> Result<()>;

    async fn delete_chunk(&self, addr: &str, chunk_id: &str) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct HttpPeerClient {
    http_client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, addr: &str) -> ChunkServerClient {
        ChunkServerClient::with_client(self.http_client.clone(), addr)
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn push_chunk(&self, addr: &str, chunk_id: &str, data: Bytes) -> Result<()> {
        self.client(addr).push_chunk(chunk_id, data).await?;
        Ok(())
    }

    async fn delete_chunk(&self, addr: &str, chunk_id: &str) -> Result<()> {
        self.client(addr).delete_chunk(chunk_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_scheme() {
        assert_eq!(ChunkServerClient::new("127.0.0.1:8899").base_url(), "http://127.0.0.1:8899");
        assert_eq!(
            ChunkServerClient::new("https://node-a:8899/").base_url(),
            "https://node-a:8899"
        );
    }
}
