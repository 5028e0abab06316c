//! Upgrade-then-recover against the in-memory store and object graph

use pretty_assertions::assert_eq;
use std::sync::Arc;
use vhstore_record::{attr, category, Record, RecordBuilder, RecordId};
use vhstore_recovery::{
    ConfiguredObject, DurableConfigurationStore, MemoryConfigurationStore, RecoveryError,
    RecoveryTarget, VirtualHostStoreRecoverer,
};
use vhstore_test_utils::{
    current_store, init_tracing, virtual_host, LegacyStore, TestObject, TestVirtualHostNode,
    VIRTUAL_HOST_NAME,
};
use vhstore_upgrade::{UpgradeError, MODEL_VERSION};

struct Harness {
    store: Arc<MemoryConfigurationStore>,
    node: Arc<TestVirtualHostNode>,
    recoverer: VirtualHostStoreRecoverer,
}

impl Harness {
    fn new(store: MemoryConfigurationStore) -> Self {
        init_tracing();
        let node = TestVirtualHostNode::new(VIRTUAL_HOST_NAME);
        let target: Arc<dyn RecoveryTarget> = node.clone();
        Self {
            store: Arc::new(store),
            node,
            recoverer: VirtualHostStoreRecoverer::new(target),
        }
    }

    fn dyn_store(&self) -> Arc<dyn DurableConfigurationStore> {
        self.store.clone()
    }

    fn upgrade_and_recover(&self, initial: &[Record]) -> Result<bool, RecoveryError> {
        self.recoverer.upgrade_and_recover(&self.dyn_store(), initial)
    }

    fn virtual_host(&self) -> Arc<TestObject> {
        self.node.test_virtual_host().unwrap()
    }

    fn child(&self, name: &str) -> Arc<TestObject> {
        self.virtual_host()
            .test_children()
            .into_iter()
            .find(|c| c.attribute(attr::NAME).as_ref().and_then(|v| v.as_str()) == Some(name))
            .unwrap()
    }
}

fn sorted_ids(records: &[Record]) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = records.iter().map(Record::id).collect();
    ids.sort();
    ids
}

fn existing(records: Vec<Record>) -> Harness {
    let harness = Harness::new(MemoryConfigurationStore::with_records(records));
    let is_new = harness.upgrade_and_recover(&[]).unwrap();
    assert!(!is_new);
    harness
}

#[test]
fn legacy_store_is_upgraded_and_persisted() {
    let legacy = LegacyStore::new();
    let harness = existing(legacy.records());

    let stored = harness.store.records();
    let root = harness.store.get(legacy.root.id()).unwrap();
    assert_eq!(root.category(), category::VIRTUAL_HOST);
    assert_eq!(root.string_attribute(attr::MODEL_VERSION), Some(MODEL_VERSION));
    assert!(stored.iter().all(|r| !r.is_category(category::BINDING)));
    assert!(stored
        .iter()
        .any(|r| r.category() == category::EXCHANGE && r.name() == Some("amq.topic")));

    let recovered = harness.node.recovered_records().unwrap();
    assert_eq!(sorted_ids(&recovered), sorted_ids(&stored));
    assert_eq!(harness.node.recovered_as_new(), Some(false));
}

#[test]
fn recovered_graph_reflects_upgraded_records() {
    let legacy = LegacyStore::new();
    let harness = existing(legacy.records());

    let exchange = harness.child("orders.direct");
    let bindings = exchange.attribute(attr::DURABLE_BINDINGS).unwrap();
    assert_eq!(bindings.as_array().map(Vec::len), Some(1));
    assert_eq!(bindings[0][attr::DESTINATION], "orders");

    let queue = harness.child("orders");
    assert_eq!(queue.attribute(attr::DURABLE), Some(true.into()));
    assert_eq!(queue.attribute(attr::OWNER), None);
}

#[test]
fn new_store_forces_secure_attribute_update_once() {
    let harness = Harness::new(MemoryConfigurationStore::new());

    let is_new = harness.upgrade_and_recover(&current_store()).unwrap();

    assert!(is_new);
    assert_eq!(harness.store.len(), 3);
    assert_eq!(harness.node.recovered_as_new(), Some(true));
    assert_eq!(harness.node.secure_attribute_updates(), 1);

    harness.recoverer.reload_and_recover(&harness.dyn_store()).unwrap();

    assert_eq!(harness.node.recovered_as_new(), Some(false));
    assert_eq!(harness.node.secure_attribute_updates(), 1);
}

#[test]
fn existing_store_does_not_force_secure_attribute_update() {
    let harness = existing(current_store());
    assert_eq!(harness.node.secure_attribute_updates(), 0);
}

#[test]
fn unsupported_version_aborts_before_recovery() {
    let harness = Harness::new(MemoryConfigurationStore::with_records([virtual_host(Some(
        "99.0",
    ))]));

    let err = harness.upgrade_and_recover(&[]).unwrap_err();

    assert!(matches!(
        err,
        RecoveryError::Upgrade(UpgradeError::UnsupportedVersion { .. })
    ));
    assert!(harness.node.recovered_records().is_none());
}

#[test]
fn failed_upgrade_leaves_store_untouched() {
    let root = virtual_host(Some("2.0"));
    let queue = RecordBuilder::new(category::QUEUE)
        .name("q")
        .attribute(
            attr::BINDINGS,
            serde_json::json!([{"name": "k", "exchange": "no-such"}]),
        )
        .parent(category::VIRTUAL_HOST, root.id())
        .build();
    let harness = Harness::new(MemoryConfigurationStore::with_records([root, queue]));
    let before = harness.store.records();

    let err = harness.upgrade_and_recover(&[]).unwrap_err();

    assert!(matches!(
        err,
        RecoveryError::Upgrade(UpgradeError::UnresolvedExchange { .. })
    ));
    assert_eq!(harness.store.records(), before);
    assert!(harness.node.recovered_records().is_none());
}

#[test]
fn listener_is_attached_once_to_every_durable_object() {
    let harness = existing(current_store());

    let virtual_host = harness.virtual_host();
    assert_eq!(virtual_host.listener_count(), 1);
    for child in virtual_host.test_children() {
        assert_eq!(child.listener_count(), 1);
    }
    assert_eq!(harness.node.node_listener_count(), 1);
}

#[test]
fn durable_child_added_later_is_persisted_and_listened_to() {
    let harness = existing(current_store());
    let virtual_host = harness.virtual_host();

    let queue = TestObject::new(category::QUEUE, "late", true);
    let consumer = TestObject::new("Consumer", "c1", false);
    queue.add_child(Arc::clone(&consumer));
    virtual_host.add_child(Arc::clone(&queue));

    let stored = harness.store.get(queue.id()).unwrap();
    assert_eq!(stored.name(), Some("late"));
    assert_eq!(queue.listener_count(), 1);
    assert!(harness.store.get(consumer.id()).is_none());
    assert_eq!(consumer.listener_count(), 0);
}

#[test]
fn non_durable_child_is_ignored() {
    let harness = existing(current_store());
    let before = harness.store.len();

    let temporary = TestObject::new(category::QUEUE, "temp", false);
    harness.virtual_host().add_child(Arc::clone(&temporary));

    assert_eq!(harness.store.len(), before);
    assert_eq!(temporary.listener_count(), 0);
}

#[test]
fn attribute_change_is_written_back() {
    let harness = existing(current_store());
    let queue = harness.child("q");

    queue.set_attribute("description", "audit trail");

    let stored = harness.store.get(queue.id()).unwrap();
    assert_eq!(stored.string_attribute("description"), Some("audit trail"));
}

#[test]
fn deleted_object_is_removed_from_store() {
    let harness = existing(current_store());
    let queue = harness.child("q");

    queue.delete();

    assert!(harness.store.get(queue.id()).is_none());
    assert_eq!(queue.listener_count(), 0);
}

#[test]
fn removed_child_is_detached() {
    let harness = existing(current_store());
    let queue = harness.child("q");

    harness.virtual_host().remove_child(queue.id()).unwrap();

    assert_eq!(queue.listener_count(), 0);
}

#[test]
fn virtual_host_lifecycle_is_followed() {
    let harness = existing(current_store());

    let removed = harness.node.remove_virtual_host().unwrap();
    assert_eq!(removed.listener_count(), 0);

    let replacement = TestObject::new(category::VIRTUAL_HOST, "replacement", true);
    let exchange = TestObject::new(category::EXCHANGE, "fresh", true);
    replacement.add_child(Arc::clone(&exchange));
    harness.node.add_virtual_host(Arc::clone(&replacement));

    assert!(harness.store.get(replacement.id()).is_some());
    assert!(harness.store.get(exchange.id()).is_some());
    assert_eq!(replacement.listener_count(), 1);
    assert_eq!(exchange.listener_count(), 1);
}

#[test]
fn concurrent_child_additions_are_all_persisted() {
    let harness = existing(current_store());
    let virtual_host = harness.virtual_host();
    let before = harness.store.len();

    let added: Vec<Arc<TestObject>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let virtual_host = Arc::clone(&virtual_host);
                scope.spawn(move || {
                    (0..16)
                        .map(|i| {
                            let queue = TestObject::new(category::QUEUE, &format!("q-{t}-{i}"), true);
                            virtual_host.add_child(Arc::clone(&queue));
                            queue
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(harness.store.len(), before + added.len());
    for queue in &added {
        assert!(harness.store.get(queue.id()).is_some());
        assert_eq!(queue.listener_count(), 1);
    }
}

#[test]
fn reload_requires_open_store() {
    let harness = Harness::new(MemoryConfigurationStore::with_records(current_store()));

    let err = harness
        .recoverer
        .reload_and_recover(&harness.dyn_store())
        .unwrap_err();

    assert!(matches!(err, RecoveryError::Store(_)));
}

#[test]
fn upgraded_records_can_be_reloaded_unchanged() {
    let harness = existing(LegacyStore::new().records());
    let first = harness.node.recovered_records().unwrap();

    harness.recoverer.reload_and_recover(&harness.dyn_store()).unwrap();

    let second = harness.node.recovered_records().unwrap();
    assert_eq!(sorted_ids(&first), sorted_ids(&second));
    let root = second
        .iter()
        .find(|r| r.is_category(category::VIRTUAL_HOST))
        .unwrap();
    assert_eq!(root.string_attribute(attr::MODEL_VERSION), Some(MODEL_VERSION));
}

#[test]
fn records_created_directly_are_visible_on_reload() {
    let harness = existing(current_store());
    let root_id = harness.virtual_host().id();
    let queue = RecordBuilder::new(category::QUEUE)
        .name("direct")
        .parent(category::VIRTUAL_HOST, root_id)
        .build();

    harness.store.create(&queue).unwrap();
    harness.recoverer.reload_and_recover(&harness.dyn_store()).unwrap();

    assert_eq!(harness.child("direct").listener_count(), 1);
}
