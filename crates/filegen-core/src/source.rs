//! Source connection: one self-healing session to a generator source
//!
//! The connection owns the receiving end of the source's request queue and
//! reports everything it hears through a [`SourceEvents`] sink. It redials
//! forever with backoff until the sink goes away.

use std::sync::Arc;

use async_trait::async_trait;
use filegen_api::{ClientRequest, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::BackoffConfig;
use crate::state::ConnectionState;
use crate::transport::{Connector, MessageStream, SourceTransport};

/// Receiver of everything a source connection reports
///
/// Each method returns `false` once the receiver is gone, which stops the
/// connection.
#[async_trait]
pub trait SourceEvents: Clone + Send + Sync + 'static {
    /// A message was decoded from `source`
    async fn message_received(&self, source: &str, message: ServerMessage) -> bool;

    /// `source` connected again after an earlier session ended
    async fn reconnected(&self, source: &str) -> bool;

    fn is_closed(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Transport closed or failed; redial
    Closed,
    /// Nobody is listening any more; stop
    Stopped,
}

/// Connection lifecycle for a single source
pub struct SourceConnection<E> {
    name: String,
    connector: Arc<dyn Connector>,
    requests: mpsc::Receiver<ClientRequest>,
    events: E,
    backoff: Backoff,
    state: ConnectionState,
}

impl<E: SourceEvents> SourceConnection<E> {
    pub fn new(
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
        requests: mpsc::Receiver<ClientRequest>,
        events: E,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            name: name.into(),
            connector,
            requests,
            events,
            backoff: Backoff::new(backoff),
            state: ConnectionState::Disconnected,
        }
    }

    fn transition_to(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        debug!(source = %self.name, from = %self.state, to = %next, "connection state");
        self.state = next;
    }

    /// Dial, serve and redial until the event sink or request queue closes
    pub async fn run(mut self) {
        let mut connected_before = false;

        while !self.events.is_closed() {
            self.transition_to(ConnectionState::Connecting);

            let transport = match self.connector.connect(&self.name).await {
                Ok(transport) => transport,
                Err(e) => {
                    self.transition_to(ConnectionState::Disconnected);
                    let delay = self.backoff.next_delay();
                    warn!(
                        source = %self.name,
                        error = %e,
                        retry_in = ?delay,
                        "error connecting to source"
                    );
                    sleep(delay).await;
                    continue;
                }
            };

            self.transition_to(ConnectionState::Connected);
            self.backoff.reset();
            info!(source = %self.name, "connected to source");

            if connected_before {
                if !self.events.reconnected(&self.name).await {
                    break;
                }
            } else {
                connected_before = true;
            }

            let end = self.serve(transport).await;
            self.transition_to(ConnectionState::Disconnected);
            if end == SessionEnd::Stopped {
                break;
            }

            sleep(self.backoff.current()).await;
        }

        info!(source = %self.name, "source connection stopped");
    }

    /// Write loop for one session; the read loop runs on its own task
    async fn serve(&mut self, transport: SourceTransport) -> SessionEnd {
        let SourceTransport {
            requests: mut sink,
            messages,
        } = transport;

        let (close_tx, mut close_rx) = oneshot::channel();
        let reader = tokio::spawn(read_messages(
            self.name.clone(),
            messages,
            self.events.clone(),
            close_tx,
        ));

        let end = loop {
            tokio::select! {
                end = &mut close_rx => break end.unwrap_or(SessionEnd::Closed),
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        break SessionEnd::Stopped;
                    };
                    if let Err(e) = sink.feed(request).await {
                        warn!(source = %self.name, error = %e, "error encoding client request");
                        break SessionEnd::Closed;
                    }
                    // Batch writes while more requests are queued
                    if self.requests.is_empty()
                        && let Err(e) = sink.flush().await
                    {
                        warn!(source = %self.name, error = %e, "error flushing");
                        break SessionEnd::Closed;
                    }
                }
            }
        };

        reader.abort();
        end
    }
}

async fn read_messages<E: SourceEvents>(
    source: String,
    mut messages: MessageStream,
    events: E,
    close: oneshot::Sender<SessionEnd>,
) {
    let end = loop {
        match messages.next().await {
            Some(Ok(message)) => {
                if !events.message_received(&source, message).await {
                    break SessionEnd::Stopped;
                }
            }
            Some(Err(e)) => {
                warn!(source = %source, error = %e, "error decoding server message");
                break SessionEnd::Closed;
            }
            None => {
                info!(source = %source, "connection to source closed");
                break SessionEnd::Closed;
            }
        }
    };

    // The write loop may already have torn the session down
    let _ = close.send(end);
}
