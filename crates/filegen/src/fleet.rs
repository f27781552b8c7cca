//! Keeps the manager's registry in step with the configured machines

use std::collections::HashMap;

use filegen_core::{Machine, Manager, Manifest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Machines the daemon has registered with the manager
pub struct Fleet {
    manager: Manager,
    registered: HashMap<String, Machine>,
}

impl Fleet {
    pub fn new(manager: Manager) -> Self {
        Self {
            manager,
            registered: HashMap::new(),
        }
    }

    /// Add, update or remove machines so the registry matches `machines`
    ///
    /// # Errors
    /// Returns an error if the manager rejects a change
    pub async fn apply(&mut self, machines: Vec<Machine>) -> eyre::Result<()> {
        let mut desired: HashMap<String, Machine> = HashMap::new();
        for machine in machines {
            let hostname = machine.hostname().to_string();
            if desired.insert(hostname.clone(), machine).is_some() {
                warn!(host = %hostname, "machine configured twice, using the last entry");
            }
        }

        let gone: Vec<String> = self
            .registered
            .keys()
            .filter(|hostname| !desired.contains_key(*hostname))
            .cloned()
            .collect();
        for hostname in gone {
            self.manager.remove(hostname.as_str()).await?;
            self.registered.remove(&hostname);
        }

        for (hostname, machine) in desired {
            match self.registered.get(&hostname) {
                Some(current) if *current == machine => continue,
                Some(_) => self.manager.update(machine.clone()).await?,
                None => {
                    let manifests = self.manager.add(machine.clone()).await?;
                    tokio::spawn(watch_manifests(hostname.clone(), manifests));
                }
            }
            self.registered.insert(hostname, machine);
        }

        Ok(())
    }

    pub fn machine_count(&self) -> usize {
        self.registered.len()
    }
}

/// Log every manifest delivered for one machine
async fn watch_manifests(hostname: String, mut manifests: mpsc::Receiver<Manifest>) {
    while let Some(manifest) = manifests.recv().await {
        info!(
            host = %manifest.hostname,
            source = %manifest.source,
            files = manifest.files.len(),
            "manifest ready"
        );
        for file in &manifest.files {
            debug!(
                host = %manifest.hostname,
                path = %file.pathname,
                hash = %file.hash,
                length = file.length,
                "computed file"
            );
        }
    }
    debug!(host = %hostname, "manifest channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use filegen_api::{ClientRequest, ServerCodec, YieldRequest};
    use filegen_core::ManagerActorArgs;
    use filegen_store::MemoryObjectStore;
    use futures::StreamExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_util::codec::Framed;

    use super::*;

    /// Accepts sessions on localhost and reports every yield request
    async fn yield_listener() -> (String, mpsc::UnboundedReceiver<YieldRequest>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut framed = Framed::new(stream, ServerCodec::new());
                    while let Some(Ok(request)) = framed.next().await {
                        if let ClientRequest::Yield(request) = request {
                            let _ = tx.send(request);
                        }
                    }
                });
            }
        });

        (addr, rx)
    }

    async fn next_yields(
        rx: &mut mpsc::UnboundedReceiver<YieldRequest>,
        n: usize,
    ) -> Vec<YieldRequest> {
        let mut yields = Vec::new();
        for _ in 0..n {
            let request = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for a yield")
                .expect("listener stopped");
            yields.push(request);
        }
        yields.sort_by(|a, b| a.machine.hostname.cmp(&b.machine.hostname));
        yields
    }

    #[tokio::test]
    async fn test_apply_adds_updates_and_removes() {
        let (source, mut yields) = yield_listener().await;
        let manager = Manager::spawn(ManagerActorArgs::new(Arc::new(MemoryObjectStore::new())));
        let mut fleet = Fleet::new(manager.clone());

        fleet
            .apply(vec![
                Machine::new("web-1").with_file("/etc/motd", source.as_str()),
                Machine::new("db-1").with_file("/etc/db.conf", source.as_str()),
            ])
            .await
            .unwrap();

        let first = next_yields(&mut yields, 2).await;
        assert_eq!(first[0].machine.hostname, "db-1");
        assert_eq!(first[1].machine.hostname, "web-1");
        assert_eq!(manager.stats().await.unwrap().machines, 2);

        fleet
            .apply(vec![
                Machine::new("web-1").with_file("/etc/motd", source.as_str()),
                Machine::new("db-1").with_file("/etc/my.cnf", source.as_str()),
                Machine::new("cache-1").with_file("/etc/old.conf", source.as_str()),
                Machine::new("cache-1").with_file("/etc/redis.conf", source.as_str()),
            ])
            .await
            .unwrap();

        // Unchanged web-1 is left alone
        let second = next_yields(&mut yields, 2).await;
        assert_eq!(second[0].machine.hostname, "cache-1");
        assert_eq!(second[0].pathnames, vec!["/etc/redis.conf"]);
        assert_eq!(second[1].machine.hostname, "db-1");
        assert_eq!(second[1].pathnames, vec!["/etc/my.cnf"]);
        assert!(
            timeout(Duration::from_millis(250), yields.recv())
                .await
                .is_err()
        );
        assert_eq!(manager.stats().await.unwrap().machines, 3);
        assert_eq!(fleet.machine_count(), 3);

        fleet
            .apply(vec![Machine::new("db-1").with_file("/etc/my.cnf", source.as_str())])
            .await
            .unwrap();

        assert_eq!(manager.stats().await.unwrap().machines, 1);
        assert_eq!(fleet.machine_count(), 1);
        assert!(
            timeout(Duration::from_millis(250), yields.recv())
                .await
                .is_err()
        );

        manager.shutdown().await.unwrap();
    }
}
