//! Message types for actor communication
//!
//! Message handlers are implemented in the manager actor module.

use filegen_api::ServerMessage;
use kameo_macros::Reply;

use crate::machine::Machine;

// ============================================================================
// Machine registration
// ============================================================================

/// Register a machine; replies with its manifest receiver
#[derive(Debug)]
pub struct AddMachine {
    pub machine: Machine,
}

/// Replace a registered machine's declarations
#[derive(Debug)]
pub struct UpdateMachine {
    pub machine: Machine,
}

/// Deregister a machine
#[derive(Debug)]
pub struct RemoveMachine {
    /// Hostname to remove
    pub hostname: String,
}

// ============================================================================
// Source connection events
// ============================================================================

/// A source pushed a message
#[derive(Debug)]
pub struct ServerMessageReceived {
    /// Source the message came from
    pub source: String,
    pub message: ServerMessage,
}

/// A source connected again after losing its session
#[derive(Debug)]
pub struct SourceReconnected {
    pub source: String,
}

// ============================================================================
// Introspection
// ============================================================================

/// Get manager counters
#[derive(Debug)]
pub struct GetStats;

/// Manager counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reply)]
pub struct ManagerStats {
    /// Registered machines
    pub machines: usize,
    /// Sources with a running connection
    pub sources: usize,
    /// Unique hashes being fetched (the `filegen_client_object_waits` gauge)
    pub object_waits: usize,
    /// Manifests waiting on at least one object
    pub pending_manifests: usize,
}
