//! `ManagerActor`: machine registry, source table and object-wait table
//!
//! All manager state is owned by this actor and mutated only from its message
//! handlers, which kameo runs one at a time. Source connections report back
//! through a weak reference to the actor.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use filegen_api::{
    ClientRequest, FileInfo, GetObjectRequest, GetObjectResponse, Hash, ServerMessage,
    YieldRequest, YieldResponse,
};
use filegen_store::ObjectStore;
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::machine::{MachineEntry, Manifest};
use crate::message::{
    AddMachine, GetStats, ManagerStats, RemoveMachine, ServerMessageReceived, SourceReconnected,
    UpdateMachine,
};
use crate::metrics::{describe_metrics, set_object_waits};
use crate::source::{SourceConnection, SourceEvents};
use crate::transport::{Connector, TcpConnector};
use crate::wait::ObjectWaitTable;

/// Arguments for spawning a `ManagerActor`
pub struct ManagerActorArgs {
    /// Queue sizes, backoff and dial settings
    pub config: ManagerConfig,
    /// Store receiving fetched objects
    pub store: Arc<dyn ObjectStore>,
    /// Dialer used for every source
    pub connector: Arc<dyn Connector>,
}

impl ManagerActorArgs {
    /// Default settings, dialing sources over TCP
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn ObjectStore>, config: ManagerConfig) -> Self {
        Self {
            connector: Arc::new(TcpConnector::new(config.dial_timeout)),
            config,
            store,
        }
    }
}

/// Running connection for one source
struct SourceHandle {
    requests: mpsc::Sender<ClientRequest>,
    task: JoinHandle<()>,
}

/// Which manifest slot a batch fills
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ManifestKey {
    hostname: String,
    source: String,
}

/// Continuation parked in the object-wait table
#[derive(Debug, Clone)]
struct ManifestWaiter {
    key: ManifestKey,
    batch: u64,
}

/// Files from one `YieldResponse` waiting on missing objects
#[derive(Debug)]
struct PendingManifest {
    batch: u64,
    files: Vec<FileInfo>,
    missing: HashSet<Hash>,
}

/// File generation manager
pub struct ManagerActor {
    config: ManagerConfig,
    store: Arc<dyn ObjectStore>,
    connector: Arc<dyn Connector>,
    /// Registered machines by hostname
    machines: HashMap<String, MachineEntry>,
    /// Source connections by name, created on first use
    sources: HashMap<String, SourceHandle>,
    object_waits: ObjectWaitTable<ManifestWaiter>,
    /// At most one pending batch per (machine, source); newer pushes replace it
    pending: HashMap<ManifestKey, PendingManifest>,
    next_batch: u64,
    self_ref: WeakActorRef<Self>,
}

impl ManagerActor {
    /// Request queue for `name`, starting its connection if needed
    fn source(&mut self, name: &str) -> mpsc::Sender<ClientRequest> {
        if let Some(source) = self.sources.get(name) {
            return source.requests.clone();
        }

        let (tx, rx) = mpsc::channel(self.config.source_queue_capacity.max(1));
        let connection = SourceConnection::new(
            name,
            self.connector.clone(),
            rx,
            self.self_ref.clone(),
            self.config.backoff,
        );
        let task = tokio::spawn(connection.run());

        info!(source = %name, "started source connection");

        self.sources.insert(
            name.to_string(),
            SourceHandle {
                requests: tx.clone(),
                task,
            },
        );
        tx
    }

    /// Queue a request, waiting for room if the source is backed up
    async fn send_request(&mut self, source: &str, request: ClientRequest) {
        let requests = self.source(source);
        if requests.send(request).await.is_err() {
            warn!(source = %source, "source connection has stopped, dropping request");
        }
    }

    /// Issue a `YieldRequest` to every source the machine uses
    async fn subscribe(&mut self, hostname: &str) {
        let Some(machine) = self.machines.get(hostname) else {
            return;
        };
        let requests: Vec<(String, YieldRequest)> = machine
            .source_paths
            .keys()
            .filter_map(|source| {
                machine
                    .yield_request(source)
                    .map(|request| (source.clone(), request))
            })
            .collect();

        for (source, request) in requests {
            debug!(
                host = %hostname,
                source = %source,
                paths = request.pathnames.len(),
                "subscribing"
            );
            self.send_request(&source, request.into()).await;
        }
    }

    async fn handle_object(&mut self, source: &str, response: GetObjectResponse) {
        let GetObjectResponse { hash, data } = response;

        // Leave the wait entry in place; a later push of the object resolves it
        if let Err(e) = self.store.add_object(&data, Some(&hash)).await {
            error!(source = %source, hash = %hash, error = %e, "failed to store object");
            return;
        }

        let waiters = self.object_waits.resolve(&hash);
        debug!(source = %source, hash = %hash, waiters = waiters.len(), "object stored");

        for waiter in waiters {
            self.object_arrived(waiter, &hash);
        }
        set_object_waits(self.object_waits.len());
    }

    fn object_arrived(&mut self, waiter: ManifestWaiter, hash: &Hash) {
        let Some(pending) = self.pending.get_mut(&waiter.key) else {
            return;
        };
        // Superseded by a newer push
        if pending.batch != waiter.batch {
            return;
        }

        pending.missing.remove(hash);
        if !pending.missing.is_empty() {
            return;
        }

        if let Some(pending) = self.pending.remove(&waiter.key) {
            self.deliver(waiter.key, pending.files);
        }
    }

    async fn handle_yield(&mut self, source: &str, response: YieldResponse) {
        let YieldResponse { hostname, files } = response;

        let Some(machine) = self.machines.get(&hostname) else {
            debug!(source = %source, host = %hostname, "dropping files for unknown machine");
            return;
        };

        let received = files.len();
        let files: Vec<FileInfo> = files
            .into_iter()
            .filter(|file| machine.declares(source, &file.pathname))
            .collect();
        if files.len() < received {
            debug!(
                source = %source,
                host = %hostname,
                ignored = received - files.len(),
                "ignoring files not declared against source"
            );
            if files.is_empty() {
                return;
            }
        }

        let key = ManifestKey {
            hostname,
            source: source.to_string(),
        };
        let superseded = self.pending.remove(&key).is_some();
        if superseded {
            debug!(source = %source, host = %key.hostname, "superseding pending manifest");
        }

        let hashes: Vec<Hash> = files
            .iter()
            .map(|file| file.hash)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let missing = self.find_missing(&hashes).await;

        if missing.is_empty() {
            self.deliver(key, files);
            if superseded {
                self.abandon_dead_waits();
            }
            return;
        }

        let batch = self.next_batch;
        self.next_batch += 1;

        for hash in &missing {
            let waiter = ManifestWaiter {
                key: key.clone(),
                batch,
            };
            if self.object_waits.register(*hash, source, waiter) {
                debug!(source = %source, hash = %hash, "fetching object");
                self.send_request(source, GetObjectRequest { hash: *hash }.into())
                    .await;
            }
        }

        self.pending.insert(
            key,
            PendingManifest {
                batch,
                files,
                missing,
            },
        );

        // Joins above keep shared entries alive; only the old batch's own hashes go
        if superseded {
            self.abandon_dead_waits();
        } else {
            set_object_waits(self.object_waits.len());
        }
    }

    /// Drop waiters whose batch is no longer pending, and entries left empty
    fn abandon_dead_waits(&mut self) {
        let pending = &self.pending;
        let abandoned = self.object_waits.retain_waiters(|waiter| {
            pending
                .get(&waiter.key)
                .is_some_and(|batch| batch.batch == waiter.batch)
        });
        if abandoned > 0 {
            debug!(abandoned, "abandoned object waits");
        }
        set_object_waits(self.object_waits.len());
    }

    /// Hashes not yet in the store
    async fn find_missing(&self, hashes: &[Hash]) -> HashSet<Hash> {
        match self.store.check_objects(hashes).await {
            Ok(sizes) if sizes.len() == hashes.len() => hashes
                .iter()
                .zip(sizes)
                .filter(|(_, size)| size.is_none())
                .map(|(hash, _)| *hash)
                .collect(),
            Ok(sizes) => {
                warn!(
                    expected = hashes.len(),
                    got = sizes.len(),
                    store = self.store.store_type(),
                    "store answered for the wrong number of objects, treating all as missing"
                );
                hashes.iter().copied().collect()
            }
            Err(e) => {
                warn!(error = %e, "failed to check objects, treating all as missing");
                hashes.iter().copied().collect()
            }
        }
    }

    /// Hand a resolved manifest to the machine's subscriber
    ///
    /// Never waits: a subscriber that falls a full channel behind misses this
    /// manifest and catches up with the source's next push.
    fn deliver(&self, key: ManifestKey, mut files: Vec<FileInfo>) {
        let Some(machine) = self.machines.get(&key.hostname) else {
            return;
        };

        // Declarations may have narrowed while objects were in flight
        let resolved = files.len();
        files.retain(|file| machine.declares(&key.source, &file.pathname));
        if files.is_empty() && resolved > 0 {
            return;
        }

        let count = files.len();
        let ManifestKey { hostname, source } = key;
        let manifest = Manifest {
            hostname: hostname.clone(),
            source: source.clone(),
            files,
        };

        match machine.manifest_tx.try_send(manifest) {
            Ok(()) => {
                debug!(host = %hostname, source = %source, files = count, "delivered manifest");
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    host = %hostname,
                    source = %source,
                    "manifest subscriber is behind, dropping manifest"
                );
            }
            Err(TrySendError::Closed(_)) => {
                debug!(host = %hostname, "manifest subscriber has gone away");
            }
        }
    }

    async fn handle_reconnect(&mut self, source: &str) {
        let requests: Vec<YieldRequest> = self
            .machines
            .values()
            .filter_map(|machine| machine.yield_request(source))
            .collect();
        // The previous session's fetches died with it
        let refetch: Vec<Hash> = self.object_waits.requested_from(source).copied().collect();

        info!(
            source = %source,
            machines = requests.len(),
            objects = refetch.len(),
            "source reconnected, resubscribing"
        );

        for request in requests {
            self.send_request(source, request.into()).await;
        }
        for hash in refetch {
            self.send_request(source, GetObjectRequest { hash }.into())
                .await;
        }
    }
}

impl Actor for ManagerActor {
    type Args = ManagerActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "ManagerActor starting");

        describe_metrics();
        set_object_waits(0);

        Ok(Self {
            config: args.config,
            store: args.store,
            connector: args.connector,
            machines: HashMap::new(),
            sources: HashMap::new(),
            object_waits: ObjectWaitTable::new(),
            pending: HashMap::new(),
            next_batch: 0,
            self_ref: actor_ref.downgrade(),
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(reason = ?reason, "ManagerActor stopping");

        for (name, source) in self.sources.drain() {
            debug!(source = %name, "stopping source connection");
            source.task.abort();
        }

        Ok(())
    }
}

#[async_trait]
impl SourceEvents for WeakActorRef<ManagerActor> {
    async fn message_received(&self, source: &str, message: ServerMessage) -> bool {
        let Some(manager) = self.upgrade() else {
            return false;
        };
        manager
            .tell(ServerMessageReceived {
                source: source.to_string(),
                message,
            })
            .await
            .is_ok()
    }

    async fn reconnected(&self, source: &str) -> bool {
        let Some(manager) = self.upgrade() else {
            return false;
        };
        manager
            .tell(SourceReconnected {
                source: source.to_string(),
            })
            .await
            .is_ok()
    }

    fn is_closed(&self) -> bool {
        self.upgrade().is_none_or(|manager| !manager.is_alive())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<AddMachine> for ManagerActor {
    type Reply = Result<mpsc::Receiver<Manifest>, CoreError>;

    async fn handle(
        &mut self,
        msg: AddMachine,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let hostname = msg.machine.hostname().to_string();

        if self.machines.contains_key(&hostname) {
            error!(host = %hostname, "machine added twice");
            return Err(CoreError::MachineAlreadyExists(hostname));
        }

        let (manifest_tx, manifest_rx) =
            mpsc::channel(self.config.manifest_channel_capacity.max(1));
        let entry = MachineEntry::new(msg.machine, manifest_tx);
        info!(host = %hostname, sources = entry.source_paths.len(), "added machine");

        self.machines.insert(hostname.clone(), entry);
        self.subscribe(&hostname).await;

        Ok(manifest_rx)
    }
}

impl Message<UpdateMachine> for ManagerActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: UpdateMachine,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let hostname = msg.machine.hostname().to_string();

        let Some(previous) = self.machines.remove(&hostname) else {
            return Err(CoreError::MachineNotFound(hostname));
        };

        let entry = MachineEntry::new(msg.machine, previous.manifest_tx);
        self.pending
            .retain(|key, _| key.hostname != hostname || entry.uses_source(&key.source));
        self.abandon_dead_waits();
        info!(host = %hostname, sources = entry.source_paths.len(), "updated machine");

        self.machines.insert(hostname.clone(), entry);
        self.subscribe(&hostname).await;

        Ok(())
    }
}

impl Message<RemoveMachine> for ManagerActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: RemoveMachine,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let hostname = msg.hostname;

        if self.machines.remove(&hostname).is_none() {
            return Err(CoreError::MachineNotFound(hostname));
        }

        // In-flight fetches still land in the store; nobody waits on them here
        self.pending.retain(|key, _| key.hostname != hostname);
        self.abandon_dead_waits();
        info!(host = %hostname, "removed machine");

        Ok(())
    }
}

impl Message<ServerMessageReceived> for ManagerActor {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ServerMessageReceived,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        match msg.message {
            ServerMessage::GetObject(response) => self.handle_object(&msg.source, response).await,
            ServerMessage::Yield(response) => self.handle_yield(&msg.source, response).await,
        }
    }
}

impl Message<SourceReconnected> for ManagerActor {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: SourceReconnected,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.handle_reconnect(&msg.source).await;
    }
}

impl Message<GetStats> for ManagerActor {
    type Reply = ManagerStats;

    async fn handle(
        &mut self,
        _msg: GetStats,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        ManagerStats {
            machines: self.machines.len(),
            sources: self.sources.len(),
            object_waits: self.object_waits.len(),
            pending_manifests: self.pending.len(),
        }
    }
}
