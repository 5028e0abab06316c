//! Upgrade-then-recover handoff
//!
//! [`VirtualHostStoreRecoverer`] opens a store, upgrades its records to the
//! current model version, writes the cumulative changes back in one commit,
//! hands the result to the [`RecoveryTarget`] and subscribes to later changes.
//!
//! The store is written only after the whole chain succeeded; a failing step
//! leaves it as it was opened.

use crate::error::{RecoveryResult, StoreError};
use crate::listener::StoreChangeListener;
use crate::object::{ChangeListener, ListenerRef, ObjectRef, RecoveryTarget};
use crate::store::DurableConfigurationStore;
use std::sync::Arc;
use vhstore_record::{category, Record};
use vhstore_upgrade::{StoreUpgrader, UpgradeConfig, UpgradeOutcome};

/// Write the cumulative changes of an upgrade back to `store`
///
/// Updates are written before deletes. Nothing is written for a no-op.
fn persist_outcome(
    store: &dyn DurableConfigurationStore,
    outcome: &UpgradeOutcome,
) -> Result<(), StoreError> {
    let updates: Vec<Record> = outcome.updates().cloned().collect();
    let deletes: Vec<Record> = outcome.deletes().cloned().collect();
    if !updates.is_empty() {
        store.update(true, &updates)?;
    }
    if !deletes.is_empty() {
        store.remove(&deletes)?;
    }
    tracing::debug!(
        "Persisted upgrade: {} updated, {} deleted",
        updates.len(),
        deletes.len()
    );
    Ok(())
}

/// Follows virtual hosts added to or removed from the recovery target
struct VirtualHostLifecycleListener {
    store_listener: Arc<StoreChangeListener>,
}

impl ChangeListener for VirtualHostLifecycleListener {
    fn child_added(&self, _object: &ObjectRef, child: &ObjectRef) {
        if child.category() == category::VIRTUAL_HOST {
            tracing::info!("Virtual host {} added; persisting durable configuration", child.id());
            self.store_listener.persist_and_attach(child);
        }
    }

    fn child_removed(&self, _object: &ObjectRef, child: &ObjectRef) {
        if child.category() == category::VIRTUAL_HOST {
            let listener: ListenerRef = Arc::clone(&self.store_listener) as ListenerRef;
            child.remove_change_listener(&listener);
        }
    }
}

/// Recovers a virtual host from its configuration store
pub struct VirtualHostStoreRecoverer {
    upgrader: StoreUpgrader,
    target: Arc<dyn RecoveryTarget>,
}

impl VirtualHostStoreRecoverer {
    /// Recoverer for `target` using the standard chain
    ///
    /// The dead-letter suffix may be overridden from the environment.
    #[must_use]
    pub fn new(target: Arc<dyn RecoveryTarget>) -> Self {
        let upgrader = StoreUpgrader::new(UpgradeConfig::from_env(target.name()));
        Self { upgrader, target }
    }

    /// Recoverer with an explicit upgrader
    #[must_use]
    pub fn with_upgrader(target: Arc<dyn RecoveryTarget>, upgrader: StoreUpgrader) -> Self {
        Self { upgrader, target }
    }

    /// The upgrader
    #[inline]
    #[must_use]
    pub fn upgrader(&self) -> &StoreUpgrader {
        &self.upgrader
    }

    /// Open, upgrade and recover
    ///
    /// # Returns
    /// Whether the store was newly created
    ///
    /// # Errors
    /// Returns error if the store cannot be read or written, the records
    /// cannot be upgraded, or the graph cannot be rebuilt
    pub fn upgrade_and_recover(
        &self,
        store: &Arc<dyn DurableConfigurationStore>,
        initial_records: &[Record],
    ) -> RecoveryResult<bool> {
        let mut records = Vec::new();
        let is_new = store.open_configuration_store(
            &mut |record: Record| records.push(record),
            initial_records,
        )?;

        let outcome = self.upgrader.upgrade(records)?;
        if !outcome.is_noop() {
            persist_outcome(store.as_ref(), &outcome)?;
            tracing::info!(
                "Virtual host {} configuration upgraded from {} to {}",
                self.target.name(),
                outcome.source_version(),
                outcome.final_version()
            );
        }

        self.recover(store, &outcome.into_records(), is_new)?;
        Ok(is_new)
    }

    /// Reload and recover without upgrading
    ///
    /// # Errors
    /// Returns error if the store cannot be read or the graph cannot be rebuilt
    pub fn reload_and_recover(&self, store: &Arc<dyn DurableConfigurationStore>) -> RecoveryResult<()> {
        let mut records = Vec::new();
        store.reload(&mut |record: Record| records.push(record))?;
        self.recover(store, &records, false)
    }

    fn recover(
        &self,
        store: &Arc<dyn DurableConfigurationStore>,
        records: &[Record],
        is_new: bool,
    ) -> RecoveryResult<()> {
        tracing::debug!("Recovering {} records (new store: {})", records.len(), is_new);
        self.target.recover(records, is_new)?;

        let store_listener = StoreChangeListener::new(Arc::clone(store));
        if let Some(virtual_host) = self.target.virtual_host() {
            let attached = store_listener.attach(&virtual_host);
            tracing::debug!("Attached store listener to {} durable objects", attached);
        }
        self.target
            .add_change_listener(Arc::new(VirtualHostLifecycleListener { store_listener }));

        if is_new {
            self.target.force_update_all_secure_attributes();
        }
        Ok(())
    }
}

impl std::fmt::Debug for VirtualHostStoreRecoverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualHostStoreRecoverer")
            .field("upgrader", &self.upgrader)
            .field("target", &self.target.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigurationStore;
    use vhstore_record::{attr, RecordBuilder};
    use vhstore_upgrade::Migration;

    fn open(store: &MemoryConfigurationStore) {
        store
            .open_configuration_store(&mut |_record: Record| {}, &[])
            .unwrap();
    }

    #[test]
    fn outcome_is_written_in_one_commit() {
        let root = RecordBuilder::new(category::VIRTUAL_HOST)
            .attribute(attr::MODEL_VERSION, "6.1")
            .build();
        let binding = RecordBuilder::new(category::BINDING)
            .name("k")
            .parent(category::EXCHANGE, vhstore_record::RecordId::new_v4())
            .parent(category::QUEUE, vhstore_record::RecordId::new_v4())
            .build();
        let store = MemoryConfigurationStore::with_records([root.clone(), binding.clone()]);
        open(&store);
        let upgrader = StoreUpgrader::with_chain(
            [Migration::DurableBindings],
            "7.0",
            UpgradeConfig::default(),
        )
        .unwrap();

        let outcome = upgrader.upgrade(store.records()).unwrap();
        persist_outcome(&store, &outcome).unwrap();

        assert_eq!(
            store
                .get(root.id())
                .and_then(|r| r.string_attribute(attr::MODEL_VERSION).map(String::from)),
            Some("7.0".to_string())
        );
        assert!(store.get(binding.id()).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn noop_outcome_writes_nothing() {
        let root = RecordBuilder::new(category::VIRTUAL_HOST)
            .attribute(attr::MODEL_VERSION, "7.0")
            .build();
        let store = MemoryConfigurationStore::with_records([root.clone()]);
        open(&store);

        let outcome = StoreUpgrader::new(UpgradeConfig::default())
            .upgrade(store.records())
            .unwrap();
        store.close();

        // a closed store rejects writes, so success means nothing was written
        assert!(persist_outcome(&store, &outcome).is_ok());
    }
}
