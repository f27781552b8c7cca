//! Transport seam between source connections and the network

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use filegen_api::{ClientCodec, ClientRequest, ProtoError, ServerMessage};
use futures::{Sink, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::error::TransportError;

/// Outbound half of a session
pub type RequestSink = Pin<Box<dyn Sink<ClientRequest, Error = ProtoError> + Send>>;

/// Inbound half of a session
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<ServerMessage, ProtoError>> + Send>>;

/// An established session with a source
pub struct SourceTransport {
    pub requests: RequestSink,
    pub messages: MessageStream,
}

impl SourceTransport {
    /// Frame any byte stream with the client codec
    pub fn framed<T>(io: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (requests, messages) = Framed::new(io, ClientCodec::new()).split::<ClientRequest>();
        Self {
            requests: Box::pin(requests),
            messages: Box::pin(messages),
        }
    }
}

/// Dials sources by name
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh session to `source`
    async fn connect(&self, source: &str) -> Result<SourceTransport, TransportError>;
}

/// Dials `host:port` source names over TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    dial_timeout: Duration,
}

impl TcpConnector {
    #[must_use]
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    #[instrument(skip(self), level = "debug")]
    async fn connect(&self, source: &str) -> Result<SourceTransport, TransportError> {
        let stream = timeout(self.dial_timeout, TcpStream::connect(source))
            .await
            .map_err(|_| TransportError::Timeout {
                endpoint: source.to_string(),
                timeout: self.dial_timeout,
            })?
            .map_err(|e| TransportError::ConnectionFailed {
                endpoint: source.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        Ok(SourceTransport::framed(stream))
    }
}
