//! Codec trait and the JSON implementation.
//!
//! The server never touches `serde_json` directly; connection handlers
//! encode and decode events through a [`Codec`], so a binary format can be
//! swapped in without touching the dispatch path.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts wire values to bytes and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` for malformed input, unknown event
    /// tags, or missing fields.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Output is UTF-8, which the WebSocket transport sends as text frames so
/// browser clients can `JSON.parse` them directly.
///
/// ```rust
/// use quizroom_protocol::{ClientEvent, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"type":"create_room","player_name":"Host"}"#;
/// let event: ClientEvent = codec.decode(bytes).unwrap();
/// assert_eq!(event.kind(), "create_room");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
