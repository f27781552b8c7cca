//! Machine declarations and the manifests delivered for them

use std::collections::{BTreeMap, BTreeSet, HashMap};

use filegen_api::{FileInfo, MachineInfo, YieldRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A file whose content is produced by a generator source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedFile {
    /// Absolute path on the machine
    pub pathname: String,
    /// Source endpoint (`host:port`) generating the content
    pub source: String,
}

impl ComputedFile {
    pub fn new(pathname: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            pathname: pathname.into(),
            source: source.into(),
        }
    }
}

/// A machine and the computed files it wants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    #[serde(flatten)]
    pub info: MachineInfo,
    #[serde(default, rename = "computed_file")]
    pub computed_files: Vec<ComputedFile>,
}

impl Machine {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            info: MachineInfo::new(hostname),
            computed_files: Vec::new(),
        }
    }

    /// Builder-style helper adding one computed file
    #[must_use]
    pub fn with_file(mut self, pathname: impl Into<String>, source: impl Into<String>) -> Self {
        self.computed_files.push(ComputedFile::new(pathname, source));
        self
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.info.hostname
    }
}

/// Fully resolved files from one source for one machine
///
/// Every hash in `files` is present in the object store when the manifest is
/// delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub hostname: String,
    pub source: String,
    pub files: Vec<FileInfo>,
}

/// Manager-side record of a registered machine
#[derive(Debug)]
pub(crate) struct MachineEntry {
    pub info: MachineInfo,
    /// pathname => source
    computed_files: HashMap<String, String>,
    /// source => pathnames, used to build subscription requests
    pub source_paths: BTreeMap<String, Vec<String>>,
    pub manifest_tx: mpsc::Sender<Manifest>,
}

impl MachineEntry {
    /// Index a machine's declarations
    ///
    /// A pathname declared twice keeps its last source.
    pub fn new(machine: Machine, manifest_tx: mpsc::Sender<Manifest>) -> Self {
        let computed_files: HashMap<String, String> = machine
            .computed_files
            .into_iter()
            .map(|file| (file.pathname, file.source))
            .collect();

        let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (pathname, source) in &computed_files {
            grouped
                .entry(source.clone())
                .or_default()
                .insert(pathname.clone());
        }
        let source_paths = grouped
            .into_iter()
            .map(|(source, paths)| (source, paths.into_iter().collect()))
            .collect();

        Self {
            info: machine.info,
            computed_files,
            source_paths,
            manifest_tx,
        }
    }

    /// Whether `pathname` is currently declared against `source`
    pub fn declares(&self, source: &str, pathname: &str) -> bool {
        self.computed_files
            .get(pathname)
            .is_some_and(|declared| declared == source)
    }

    pub fn uses_source(&self, source: &str) -> bool {
        self.source_paths.contains_key(source)
    }

    /// Subscription request for this machine's files at `source`
    pub fn yield_request(&self, source: &str) -> Option<YieldRequest> {
        self.source_paths.get(source).map(|pathnames| YieldRequest {
            machine: self.info.clone(),
            pathnames: pathnames.clone(),
        })
    }
}
