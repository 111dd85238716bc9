use anyhow::{Context, Result};
use pkg_constants::state::{BACKENDS_ROOT, FRONTENDS_ROOT, LISTENERS_ROOT};
use pkg_state::ConfigStore;
use pkg_types::config::DeleteStrategy;
use pkg_types::endpoint::{Endpoint, Identifier, IdentifierScheme};
use pkg_types::event::{ActionKind, WatchEvent};
use pkg_types::snapshot::ResourceSnapshot;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::policy::PortPolicy;
use crate::translator::{ConfigTranslator, backend_dir, frontend_dir, listener_entry};

/// Applies watch events to the config store.
///
/// Writes are plain overwrites and are never rolled back: if one of a
/// record's writes fails, the entries written before it stay in place.
pub struct Registrar {
    store: Arc<dyn ConfigStore>,
    policy: PortPolicy,
    translator: ConfigTranslator,
    delete_strategy: DeleteStrategy,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        policy: PortPolicy,
        pass_host_header: bool,
        delete_strategy: DeleteStrategy,
    ) -> Self {
        let translator = ConfigTranslator::new(policy.scheme(), pass_host_header);
        Self {
            store,
            policy,
            translator,
            delete_strategy,
        }
    }

    /// Handle one decoded watch event. Failures are logged, never returned.
    pub async fn apply(&self, event: &WatchEvent) {
        match event.action {
            ActionKind::Added | ActionKind::Modified => {
                self.register_resource(&event.snapshot).await;
            }
            ActionKind::Deleted => {
                self.unregister_resource(&event.snapshot).await;
            }
        }
    }

    /// Register every eligible port of a resource. Returns the number of records written.
    pub async fn register_resource(&self, snapshot: &ResourceSnapshot) -> usize {
        let noun = snapshot.kind.noun();
        if !snapshot.is_routable() {
            debug!(
                "Skipping {} {}/{}: not routable yet",
                noun, snapshot.namespace, snapshot.name
            );
            return 0;
        }

        info!("Inspect {} {}/{} ...", noun, snapshot.namespace, snapshot.name);
        let ports = self.policy.select(&snapshot.ports);
        if self.translator.scheme() == IdentifierScheme::PerPort {
            if let Err(e) = self
                .prune_stale_ports(&snapshot.namespace, &snapshot.name, &ports)
                .await
            {
                warn!(
                    "Can't prune stale ports of {} {}/{}: {:#}",
                    noun, snapshot.namespace, snapshot.name, e
                );
            }
        }
        if ports.is_empty() {
            match self.policy {
                PortPolicy::FirstEligible => warn!(
                    "No eligible TCP port on {} {}/{}",
                    noun, snapshot.namespace, snapshot.name
                ),
                PortPolicy::AllowList(_) => debug!(
                    "No allow-listed port on {} {}/{}",
                    noun, snapshot.namespace, snapshot.name
                ),
            }
            return 0;
        }

        let address = snapshot.address.clone().unwrap_or_default();
        let mut registered = 0;
        for port in ports {
            let endpoint = Endpoint {
                name: snapshot.name.clone(),
                namespace: snapshot.namespace.clone(),
                address: address.clone(),
                port,
            };
            match self.register(&endpoint).await {
                Ok(_) => registered += 1,
                Err(e) => warn!(
                    "Failed to register {} {}/{} port {}: {:#}",
                    noun, snapshot.namespace, snapshot.name, port, e
                ),
            }
        }
        registered
    }

    /// Remove every record of a deleted resource. Returns the number of records removed.
    pub async fn unregister_resource(&self, snapshot: &ResourceSnapshot) -> usize {
        info!(
            "Unregister {} {}/{}",
            snapshot.kind.noun(),
            snapshot.namespace,
            snapshot.name
        );
        let result = match self.delete_strategy {
            DeleteStrategy::Direct => self.unregister_direct(snapshot).await,
            DeleteStrategy::PrefixScan => {
                self.unregister_by_scan(&snapshot.namespace, &snapshot.name)
                    .await
            }
        };
        match result {
            Ok(removed) => removed,
            Err(e) => {
                warn!(
                    "Failed to unregister {}/{}: {:#}",
                    snapshot.namespace, snapshot.name, e
                );
                0
            }
        }
    }

    /// Write the backend, server and frontend entries of one endpoint.
    /// Stops at the first failed write.
    pub async fn register(&self, endpoint: &Endpoint) -> Result<Identifier> {
        let record = self.translator.to_record(endpoint)?;
        info!(
            "Register {} listening on {}:{}",
            record.id, endpoint.address, endpoint.port
        );
        for entry in record.entries() {
            self.store
                .set(&entry.key, &entry.value)
                .await
                .with_context(|| format!("Can't write key {}", entry.key))?;
        }
        Ok(record.id)
    }

    /// Delete the frontend and backend directories of one endpoint.
    /// Returns `false` when neither existed.
    pub async fn unregister(&self, endpoint: &Endpoint) -> Result<bool> {
        let id = Identifier::for_endpoint(endpoint, self.translator.scheme())?;
        self.delete_record(&id).await
    }

    async fn delete_record(&self, id: &Identifier) -> Result<bool> {
        let mut removed = false;
        let mut first_err = None;
        // Frontend first so the route never points at a missing backend.
        for dir in [frontend_dir(id), backend_dir(id)] {
            match self.store.delete(&dir, true).await {
                Ok(existed) => removed |= existed,
                Err(e) => {
                    warn!("Can't delete {}: {:#}", dir, e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.context(format!("Can't fully remove {}", id))),
            None => {
                if !removed {
                    debug!("No records for {}", id);
                }
                Ok(removed)
            }
        }
    }

    async fn unregister_direct(&self, snapshot: &ResourceSnapshot) -> Result<usize> {
        let address = snapshot.address.clone().unwrap_or_default();
        let ports = match self.policy {
            PortPolicy::AllowList(_) => self.policy.select(&snapshot.ports),
            // The per-resource identifier does not depend on the port.
            PortPolicy::FirstEligible => vec![0],
        };
        let mut removed = 0;
        for port in ports {
            let endpoint = Endpoint {
                name: snapshot.name.clone(),
                namespace: snapshot.namespace.clone(),
                address: address.clone(),
                port,
            };
            match self.unregister(&endpoint).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    "Failed to unregister {}/{} port {}: {:#}",
                    snapshot.namespace, snapshot.name, port, e
                ),
            }
        }
        Ok(removed)
    }

    /// List backends and frontends and delete every entry whose identifier
    /// names `namespace/name`, whatever its port.
    pub async fn unregister_by_scan(&self, namespace: &str, name: &str) -> Result<usize> {
        let owned = self.owned_keys(namespace, name, |_| true).await?;
        Ok(self.delete_keys(owned).await)
    }

    /// Delete the per-port records of `namespace/name` whose port is no longer selected.
    pub async fn prune_stale_ports(
        &self,
        namespace: &str,
        name: &str,
        selected: &[u16],
    ) -> Result<usize> {
        let stale = self
            .owned_keys(namespace, name, |id| {
                !id.port().is_some_and(|port| selected.contains(&port))
            })
            .await?;
        if !stale.is_empty() {
            info!(
                "Removing {} stale entries of {}/{}",
                stale.len(),
                namespace,
                name
            );
        }
        Ok(self.delete_keys(stale).await)
    }

    /// Backend and frontend directories owned by `namespace/name` that pass `filter`.
    /// Ownership compares parsed identifier components, never raw substrings.
    async fn owned_keys<F>(&self, namespace: &str, name: &str, filter: F) -> Result<Vec<String>>
    where
        F: Fn(&Identifier) -> bool,
    {
        let mut owned = Vec::new();
        for root in [FRONTENDS_ROOT, BACKENDS_ROOT] {
            let children = self
                .store
                .list(root)
                .await
                .with_context(|| format!("Can't list {}", root))?;
            for key in children {
                let segment = key.rsplit('/').next().unwrap_or_default();
                if Identifier::parse(segment)
                    .is_some_and(|id| id.belongs_to(namespace, name) && filter(&id))
                {
                    owned.push(key);
                }
            }
        }
        Ok(owned)
    }

    async fn delete_keys(&self, keys: Vec<String>) -> usize {
        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key, true).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!("Can't delete {}: {:#}", key, e),
            }
        }
        removed
    }

    /// Replace the listener set: every configured port except the first,
    /// which vulcand already serves. Returns the number of listeners written.
    pub async fn sync_listeners(&self, ports: &[u16]) -> usize {
        let listed: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
        info!("Enable extra listen ports of vulcand: {}", listed.join(","));

        if let Err(e) = self.store.delete(LISTENERS_ROOT, true).await {
            warn!("Can't clear previous listeners: {:#}", e);
        }

        let mut written = 0;
        for &port in ports.iter().skip(1) {
            let entry = match listener_entry(port) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Can't encode listener for port {}: {}", port, e);
                    continue;
                }
            };
            match self.store.set(&entry.key, &entry.value).await {
                Ok(()) => written += 1,
                Err(e) => warn!("Can't create listen port on key {}: {:#}", entry.key, e),
            }
        }
        written
    }
}
