//! Actor implementations

pub mod manager;

pub use manager::{ManagerActor, ManagerActorArgs};
