//! filegen-core: client-side file generation manager
//!
//! Implements the `ManagerActor` using the kameo framework. Machines declare
//! computed files served by generator sources; the manager subscribes to each
//! source, fetches missing objects into an object store and delivers manifests
//! once every referenced object is present.

pub mod actor;
pub mod backoff;
pub mod config;
pub mod error;
pub mod handle;
pub mod machine;
pub mod message;
pub mod metrics;
pub mod source;
pub mod state;
pub mod transport;
pub mod wait;

pub use actor::{ManagerActor, ManagerActorArgs};
pub use backoff::Backoff;
pub use config::{BackoffConfig, ManagerConfig};
pub use error::{CoreError, TransportError};
pub use handle::Manager;
pub use machine::{ComputedFile, Machine, Manifest};
pub use message::{
    AddMachine, GetStats, ManagerStats, RemoveMachine, ServerMessageReceived, SourceReconnected,
    UpdateMachine,
};
pub use source::{SourceConnection, SourceEvents};
pub use state::ConnectionState;
pub use transport::{Connector, MessageStream, RequestSink, SourceTransport, TcpConnector};
pub use wait::ObjectWaitTable;
