//! Test helpers: an in-process generator source and manager setup

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use filegen_api::{
    ClientRequest, FileInfo, GetObjectResponse, Hash, ServerCodec, ServerMessage, YieldRequest,
    YieldResponse,
};
use filegen_core::{BackoffConfig, Manager, ManagerActorArgs, ManagerConfig, Manifest};
use filegen_store::ObjectStore;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

/// How long to wait for something that should happen
const PATIENCE: Duration = Duration::from_secs(5);
/// How long to wait before concluding nothing will happen
const QUIET: Duration = Duration::from_millis(250);

enum Command {
    Push(ServerMessage),
    Disconnect,
}

/// Generator source listening on localhost, driven by the test
pub struct FakeSource {
    addr: String,
    requests: mpsc::UnboundedReceiver<ClientRequest>,
    commands: mpsc::UnboundedSender<Command>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeSource {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (request_tx, requests) = mpsc::unbounded_channel();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(serve(
            listener,
            request_tx,
            command_rx,
            connections.clone(),
        ));

        Self {
            addr,
            requests,
            commands,
            connections,
            task,
        }
    }

    /// Source name to declare computed files against
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of sessions accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn next_request(&mut self) -> ClientRequest {
        timeout(PATIENCE, self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("source stopped")
    }

    pub async fn expect_yield(&mut self) -> YieldRequest {
        match self.next_request().await {
            ClientRequest::Yield(request) => request,
            other => panic!("expected yield request, got {other:?}"),
        }
    }

    pub async fn expect_get_object(&mut self) -> Hash {
        match self.next_request().await {
            ClientRequest::GetObject(request) => request.hash,
            other => panic!("expected get object request, got {other:?}"),
        }
    }

    /// Assert no request arrives for a short while
    pub async fn assert_idle(&mut self) {
        if let Ok(Some(request)) = timeout(QUIET, self.requests.recv()).await {
            panic!("unexpected request: {request:?}");
        }
    }

    pub fn push_files(&self, hostname: &str, files: Vec<FileInfo>) {
        let response = YieldResponse {
            hostname: hostname.to_string(),
            files,
        };
        self.push(response.into());
    }

    pub fn push_object(&self, data: &[u8]) {
        let response = GetObjectResponse {
            hash: Hash::of(data),
            data: data.to_vec(),
        };
        self.push(response.into());
    }

    pub fn push(&self, message: ServerMessage) {
        let _ = self.commands.send(Command::Push(message));
    }

    /// Drop the current session; the source keeps accepting new ones
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    listener: TcpListener,
    requests: mpsc::UnboundedSender<ClientRequest>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    connections: Arc<AtomicUsize>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        connections.fetch_add(1, Ordering::SeqCst);
        let mut framed = Framed::new(stream, ServerCodec::new());

        loop {
            tokio::select! {
                request = framed.next() => match request {
                    Some(Ok(request)) => {
                        let _ = requests.send(request);
                    }
                    _ => break,
                },
                command = commands.recv() => match command {
                    Some(Command::Push(message)) => {
                        if framed.send(message).await.is_err() {
                            break;
                        }
                    }
                    Some(Command::Disconnect) => break,
                    None => return,
                },
            }
        }
    }
}

/// File entry whose content is `data`
pub fn file(pathname: &str, data: &[u8]) -> FileInfo {
    FileInfo {
        pathname: pathname.to_string(),
        hash: Hash::of(data),
        length: data.len() as u64,
    }
}

/// Manager with short redial delays
pub fn start_manager(store: Arc<dyn ObjectStore>) -> Manager {
    let config = ManagerConfig {
        backoff: BackoffConfig {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(100),
        },
        ..ManagerConfig::default()
    };
    Manager::spawn(ManagerActorArgs::with_config(store, config))
}

pub async fn next_manifest(manifests: &mut mpsc::Receiver<Manifest>) -> Manifest {
    timeout(PATIENCE, manifests.recv())
        .await
        .expect("timed out waiting for a manifest")
        .expect("manifest channel closed")
}

pub async fn assert_no_manifest(manifests: &mut mpsc::Receiver<Manifest>) {
    if let Ok(Some(manifest)) = timeout(QUIET, manifests.recv()).await {
        panic!("unexpected manifest: {manifest:?}");
    }
}
