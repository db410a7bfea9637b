//! Payload stream type and helpers.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};

/// Type alias for data streams used in backend and service APIs.
pub type PayloadStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Creates a [`PayloadStream`] yielding `contents` as a single chunk.
pub fn make_stream(contents: impl Into<Bytes>) -> PayloadStream {
    tokio_stream::once(Ok(contents.into())).boxed()
}

/// Collects a [`PayloadStream`] into a `Vec<u8>`.
pub async fn read_to_vec(mut stream: PayloadStream) -> crate::error::Result<Vec<u8>> {
    let mut payload = Vec::new();
    while let Some(chunk) = stream.try_next().await? {
        payload.extend(&chunk);
    }
    Ok(payload)
}
