//! Length-delimited JSON framing for source connections
//!
//! Each frame is a 4-byte big-endian length followed by one JSON message.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::error::ProtoError;
use crate::requests::ClientRequest;
use crate::responses::ServerMessage;

/// Largest accepted frame; object payloads travel in a single frame
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Codec for the manager side of a connection
pub type ClientCodec = JsonCodec<ClientRequest, ServerMessage>;

/// Codec for the generator side of a connection
pub type ServerCodec = JsonCodec<ServerMessage, ClientRequest>;

/// Encodes `E` and decodes `D`, one JSON document per frame
pub struct JsonCodec<E, D> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<fn(E) -> D>,
}

impl<E, D> JsonCodec<E, D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<E, D> Default for JsonCodec<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, D> fmt::Debug for JsonCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec").finish_non_exhaustive()
    }
}

impl<E, D> Decoder for JsonCodec<E, D>
where
    D: DeserializeOwned,
{
    type Item = D;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}

impl<E, D> Encoder<E> for JsonCodec<E, D>
where
    E: Serialize,
{
    type Error = ProtoError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        self.inner.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}
