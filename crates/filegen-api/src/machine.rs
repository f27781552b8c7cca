//! Machine identity sent to generators

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a managed machine
///
/// Generators use this to decide what content to produce for the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Unique hostname identifier
    pub hostname: String,
    /// Image the machine must run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_image: Option<String>,
    /// Image the machine is scheduled to move to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_image: Option<String>,
    /// Free-form labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl MachineInfo {
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            required_image: None,
            planned_image: None,
            tags: BTreeMap::new(),
        }
    }
}
