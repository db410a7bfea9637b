//! Payload compression for archived objects.
//!
//! Objects are written zstd-compressed. Reading decodes based on the codec extension of the
//! stored name; plain objects are passed through.

use async_compression::Level;
use async_compression::tokio::bufread::{ZstdDecoder, ZstdEncoder};
use futures_util::StreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::PayloadStream;
use crate::error::{Error, Result};
use crate::layout::{ZSTD_EXTENSION, split_codec_extension};

/// Wraps `stream` so that it yields the decoded contents of the object `name`.
pub fn decode(name: &str, stream: PayloadStream) -> Result<PayloadStream> {
    match split_codec_extension(name) {
        (_, None) => Ok(stream),
        (_, Some(ZSTD_EXTENSION)) => {
            let decoder = ZstdDecoder::new(StreamReader::new(stream));
            Ok(ReaderStream::new(decoder).boxed())
        }
        (_, Some(extension)) => Err(Error::UnsupportedCompression {
            name: name.to_owned(),
            extension: extension.to_owned(),
        }),
    }
}

/// Wraps `stream` so that it yields zstd-compressed contents at the given level.
pub fn encode_zstd(stream: PayloadStream, level: i32) -> PayloadStream {
    let encoder = ZstdEncoder::with_quality(StreamReader::new(stream), Level::Precise(level));
    ReaderStream::new(encoder).boxed()
}
