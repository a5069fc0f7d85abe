//! Stream Framing
//!
//! Streamed calls (file upload, file download, metadata watch) carry a sequence of
//! messages in a single HTTP body. Each message is a 4-byte big-endian length followed
//! by the bincode encoding of the message.

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use thiserror::Error;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};
use tokio_util::io::StreamReader;

const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Bytes, CodecError> {
    let body = bincode::serialize(msg)?;
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    buf.put_u32(len);
    buf.extend_from_slice(&body);
    Ok(buf.freeze())
}

/// Turns a raw body stream into a stream of decoded messages.
///
/// Frames longer than `max_frame_len` end the stream with an error.
pub fn decode_frames<T, S, E>(
    body: S,
    max_frame_len: usize,
) -> BoxStream<'static, Result<T, CodecError>>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let reader = StreamReader::new(body.map_err(io::Error::other));
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(FRAME_HEADER_LEN)
        .max_frame_length(max_frame_len)
        .new_codec();

    FramedRead::new(reader, codec)
        .map(|frame| {
            let frame = frame?;
            Ok(bincode::deserialize(&frame)?)
        })
        .boxed()
}
