//! Object-wait table: deduplicates fetches of the same content hash
//!
//! Only the manager actor touches the table, so it needs no locking.

use std::collections::HashMap;

use filegen_api::Hash;

#[derive(Debug)]
struct WaitEntry<W> {
    /// Source the single outstanding fetch was sent to
    source: String,
    waiters: Vec<W>,
}

/// Pending continuations keyed by the hash they wait for
#[derive(Debug)]
pub struct ObjectWaitTable<W> {
    entries: HashMap<Hash, WaitEntry<W>>,
}

impl<W> Default for ObjectWaitTable<W> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<W> ObjectWaitTable<W> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `waiter` for `hash`, creating the entry if needed
    ///
    /// Returns `true` when this created the entry, meaning the caller must
    /// fetch the object from `source`. Joining an existing entry keeps the
    /// source of the original fetch.
    pub fn register(&mut self, hash: Hash, source: &str, waiter: W) -> bool {
        match self.entries.get_mut(&hash) {
            Some(entry) => {
                entry.waiters.push(waiter);
                false
            }
            None => {
                self.entries.insert(
                    hash,
                    WaitEntry {
                        source: source.to_string(),
                        waiters: vec![waiter],
                    },
                );
                true
            }
        }
    }

    /// Remove the entry for `hash`, returning its waiters in registration order
    pub fn resolve(&mut self, hash: &Hash) -> Vec<W> {
        self.entries
            .remove(hash)
            .map(|entry| entry.waiters)
            .unwrap_or_default()
    }

    /// Drop waiters for which `keep` is false, then entries left without any
    ///
    /// Returns the number of entries abandoned. A later `register` for an
    /// abandoned hash starts a fresh fetch.
    pub fn retain_waiters(&mut self, mut keep: impl FnMut(&W) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.waiters.retain(|waiter| keep(waiter));
            !entry.waiters.is_empty()
        });
        before - self.entries.len()
    }

    /// Hashes whose outstanding fetch went to `source`
    pub fn requested_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Hash> + 'a {
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.source == source)
            .map(|(hash, _)| hash)
    }

    /// Number of unique hashes being waited for
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
