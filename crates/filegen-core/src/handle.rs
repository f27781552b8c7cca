//! Cloneable handle over a running `ManagerActor`

use std::fmt::Display;

use kameo::actor::{ActorRef, Spawn};
use kameo::error::SendError;
use tokio::sync::mpsc;

use crate::actor::{ManagerActor, ManagerActorArgs};
use crate::error::CoreError;
use crate::machine::{Machine, Manifest};
use crate::message::{AddMachine, GetStats, ManagerStats, RemoveMachine, UpdateMachine};

/// Client-side file generation manager
///
/// Dropping every handle stops the manager and its source connections.
#[derive(Clone)]
pub struct Manager {
    actor: ActorRef<ManagerActor>,
}

impl Manager {
    /// Spawn a manager actor
    #[must_use]
    pub fn spawn(args: ManagerActorArgs) -> Self {
        Self {
            actor: ManagerActor::spawn(args),
        }
    }

    /// Register a machine and subscribe to its files
    ///
    /// Returns the receiver on which the machine's manifests are delivered.
    /// A manifest that finds the channel full is dropped; the source's next
    /// push for the machine supersedes it anyway.
    ///
    /// # Errors
    /// Returns `MachineAlreadyExists` if the hostname is registered.
    pub async fn add(&self, machine: Machine) -> Result<mpsc::Receiver<Manifest>, CoreError> {
        self.actor
            .ask(AddMachine { machine })
            .await
            .map_err(into_core_error)
    }

    /// Replace a machine's declarations and resubscribe
    ///
    /// # Errors
    /// Returns `MachineNotFound` if the hostname is not registered.
    pub async fn update(&self, machine: Machine) -> Result<(), CoreError> {
        self.actor
            .ask(UpdateMachine { machine })
            .await
            .map_err(into_core_error)
    }

    /// Deregister a machine, closing its manifest channel
    ///
    /// # Errors
    /// Returns `MachineNotFound` if the hostname is not registered.
    pub async fn remove(&self, hostname: impl Into<String>) -> Result<(), CoreError> {
        self.actor
            .ask(RemoveMachine {
                hostname: hostname.into(),
            })
            .await
            .map_err(into_core_error)
    }

    /// # Errors
    /// Returns an error if the manager is not running.
    pub async fn stats(&self) -> Result<ManagerStats, CoreError> {
        self.actor
            .ask(GetStats)
            .await
            .map_err(|e| CoreError::ActorError(e.to_string()))
    }

    /// Stop the manager after queued messages are handled
    ///
    /// # Errors
    /// Returns an error if the manager already stopped.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.actor
            .stop_gracefully()
            .await
            .map_err(|e| CoreError::ActorError(format!("{e:?}")))
    }
}

fn into_core_error<M>(e: SendError<M, CoreError>) -> CoreError
where
    SendError<M, CoreError>: Display,
{
    match e {
        SendError::HandlerError(e) => e,
        other => CoreError::ActorError(other.to_string()),
    }
}
