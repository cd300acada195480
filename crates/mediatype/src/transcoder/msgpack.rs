//! MessagePack transcoder, `application/msgpack`.
//!
//! [`Value::Bytes`] is written with the `bin` family and read back as bytes. Timestamps are
//! written as ISO-8601 strings and come back as [`Value::String`].

use crate::error::{ContentError, DecodeError, EncodeError};
use crate::transcoder::{BinaryFormat, BinaryTranscoder};
use crate::value::Value;

pub type MsgPackTranscoder = BinaryTranscoder<MsgPackFormat>;

pub const MSGPACK_CONTENT_TYPE: &str = "application/msgpack";

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackFormat;

impl BinaryFormat for MsgPackFormat {
    fn pack(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        rmp_serde::to_vec(value).map_err(EncodeError::new)
    }

    fn unpack(&self, data: &[u8]) -> Result<Value, DecodeError> {
        rmp_serde::from_slice(data).map_err(|e| DecodeError::new(format!("invalid MessagePack: {e}")))
    }
}

/// # Errors
///
/// Never fails for the built-in content type, the `Result` mirrors the other constructors.
pub fn msgpack_transcoder() -> Result<MsgPackTranscoder, ContentError> {
    BinaryTranscoder::new(MSGPACK_CONTENT_TYPE, MsgPackFormat)
}
