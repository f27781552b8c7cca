//! Client to source requests

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::machine::MachineInfo;

/// Message sent from the manager to a generator source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Yield(YieldRequest),
    GetObject(GetObjectRequest),
}

/// Subscribe (or resubscribe) a machine to a set of computed files
///
/// Safe to repeat; the source replaces any earlier interest for the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldRequest {
    pub machine: MachineInfo,
    pub pathnames: Vec<String>,
}

/// Ask the source for the payload of an object it referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectRequest {
    pub hash: Hash,
}

impl From<YieldRequest> for ClientRequest {
    fn from(request: YieldRequest) -> Self {
        Self::Yield(request)
    }
}

impl From<GetObjectRequest> for ClientRequest {
    fn from(request: GetObjectRequest) -> Self {
        Self::GetObject(request)
    }
}
