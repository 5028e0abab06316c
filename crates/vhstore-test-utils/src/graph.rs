//! In-memory object graph for recovery tests

use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use vhstore_record::{attr, category, Attributes, Parents, Record, RecordId};
use vhstore_recovery::{
    same_listener, ConfiguredObject, ListenerRef, ObjectRef, RecoveryError, RecoveryResult,
    RecoveryTarget,
};

#[derive(Default)]
struct ObjectState {
    attributes: Attributes,
    parents: Parents,
    children: Vec<Arc<TestObject>>,
    listeners: Vec<ListenerRef>,
}

/// Configured object that notifies its listeners synchronously
pub struct TestObject {
    id: RecordId,
    category: String,
    durable: bool,
    state: RwLock<ObjectState>,
    this: Weak<TestObject>,
}

impl TestObject {
    /// Create an object with a fresh id
    #[must_use]
    pub fn new(category: impl Into<String>, name: &str, durable: bool) -> Arc<Self> {
        let mut attributes = Attributes::new();
        attributes.insert(attr::NAME.to_string(), Value::from(name));
        Self::build(RecordId::new_v4(), category.into(), durable, attributes, Parents::new())
    }

    /// Create an object from a record; `durable` defaults to true
    #[must_use]
    pub fn from_record(record: &Record) -> Arc<Self> {
        let durable = record
            .attribute(attr::DURABLE)
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Self::build(
            record.id(),
            category::short_name(record.category()).to_string(),
            durable,
            record.attributes().clone(),
            record.parents().clone(),
        )
    }

    fn build(
        id: RecordId,
        category: String,
        durable: bool,
        attributes: Attributes,
        parents: Parents,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            category,
            durable,
            state: RwLock::new(ObjectState {
                attributes,
                parents,
                ..ObjectState::default()
            }),
            this: this.clone(),
        })
    }

    fn object_ref(&self) -> Option<ObjectRef> {
        self.this.upgrade().map(|this| this as ObjectRef)
    }

    fn listeners(&self) -> Vec<ListenerRef> {
        self.state.read().listeners.clone()
    }

    fn adopt(&self, child: Arc<TestObject>) {
        self.state.write().children.push(child);
    }

    /// Add a child and notify listeners
    pub fn add_child(&self, child: Arc<TestObject>) {
        self.adopt(Arc::clone(&child));
        let Some(object) = self.object_ref() else {
            return;
        };
        let child: ObjectRef = child;
        for listener in self.listeners() {
            listener.child_added(&object, &child);
        }
    }

    /// Remove a child by id and notify listeners
    pub fn remove_child(&self, id: RecordId) -> Option<Arc<TestObject>> {
        let removed = {
            let mut state = self.state.write();
            let position = state.children.iter().position(|c| c.id == id)?;
            state.children.remove(position)
        };
        if let Some(object) = self.object_ref() {
            let child: ObjectRef = Arc::clone(&removed) as ObjectRef;
            for listener in self.listeners() {
                listener.child_removed(&object, &child);
            }
        }
        Some(removed)
    }

    /// Set an attribute and notify listeners
    pub fn set_attribute(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let old = self
            .state
            .write()
            .attributes
            .insert(name.to_string(), value.clone());
        if let Some(object) = self.object_ref() {
            for listener in self.listeners() {
                listener.attribute_set(&object, name, old.as_ref(), Some(&value));
            }
        }
    }

    /// Notify listeners that this object was deleted
    pub fn delete(&self) {
        if let Some(object) = self.object_ref() {
            for listener in self.listeners() {
                listener.deleted(&object);
            }
        }
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.state.read().attributes.get(name).cloned()
    }

    /// Direct children as concrete objects
    #[must_use]
    pub fn test_children(&self) -> Vec<Arc<TestObject>> {
        self.state.read().children.clone()
    }

    /// Number of attached listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.state.read().listeners.len()
    }
}

impl fmt::Debug for TestObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestObject")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("durable", &self.durable)
            .finish_non_exhaustive()
    }
}

impl ConfiguredObject for TestObject {
    fn id(&self) -> RecordId {
        self.id
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn is_durable(&self) -> bool {
        self.durable
    }

    fn children(&self) -> Vec<ObjectRef> {
        self.state
            .read()
            .children
            .iter()
            .map(|c| Arc::clone(c) as ObjectRef)
            .collect()
    }

    fn as_record(&self) -> Record {
        let state = self.state.read();
        Record::new(
            self.id,
            self.category.clone(),
            state.attributes.clone(),
            state.parents.clone(),
        )
    }

    fn add_change_listener(&self, listener: ListenerRef) -> bool {
        let mut state = self.state.write();
        if state.listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        state.listeners.push(listener);
        true
    }

    fn remove_change_listener(&self, listener: &ListenerRef) -> bool {
        let mut state = self.state.write();
        let before = state.listeners.len();
        state.listeners.retain(|l| !same_listener(l, listener));
        state.listeners.len() != before
    }
}

#[derive(Debug, Clone)]
struct Recovered {
    records: Vec<Record>,
    is_new: bool,
}

/// Virtual host node that rebuilds a [`TestObject`] tree from records
///
/// Every non-root record becomes a child of the object named by its
/// `VirtualHost` parent, or of the virtual host when that is missing.
pub struct TestVirtualHostNode {
    name: String,
    node: Arc<TestObject>,
    recovered: RwLock<Option<Recovered>>,
    secure_updates: AtomicUsize,
}

impl TestVirtualHostNode {
    /// Create a node
    #[must_use]
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            node: TestObject::new("VirtualHostNode", name, false),
            recovered: RwLock::new(None),
            secure_updates: AtomicUsize::new(0),
        })
    }

    /// The current virtual host object
    #[must_use]
    pub fn test_virtual_host(&self) -> Option<Arc<TestObject>> {
        self.node
            .test_children()
            .into_iter()
            .find(|c| c.category == category::VIRTUAL_HOST)
    }

    /// Add a virtual host, notifying node listeners
    pub fn add_virtual_host(&self, virtual_host: Arc<TestObject>) {
        self.node.add_child(virtual_host);
    }

    /// Remove the virtual host, notifying node listeners
    pub fn remove_virtual_host(&self) -> Option<Arc<TestObject>> {
        let virtual_host = self.test_virtual_host()?;
        self.node.remove_child(virtual_host.id)
    }

    /// Records handed to the last recovery
    #[must_use]
    pub fn recovered_records(&self) -> Option<Vec<Record>> {
        self.recovered.read().as_ref().map(|r| r.records.clone())
    }

    /// `is_new` flag of the last recovery
    #[must_use]
    pub fn recovered_as_new(&self) -> Option<bool> {
        self.recovered.read().as_ref().map(|r| r.is_new)
    }

    /// How many times secure attributes were force-updated
    #[must_use]
    pub fn secure_attribute_updates(&self) -> usize {
        self.secure_updates.load(Ordering::SeqCst)
    }

    /// Listeners attached to the node itself
    #[must_use]
    pub fn node_listener_count(&self) -> usize {
        self.node.listener_count()
    }
}

impl fmt::Debug for TestVirtualHostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestVirtualHostNode")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RecoveryTarget for TestVirtualHostNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn recover(&self, records: &[Record], is_new: bool) -> RecoveryResult<()> {
        *self.recovered.write() = Some(Recovered {
            records: records.to_vec(),
            is_new,
        });
        self.node.state.write().children.clear();
        if records.is_empty() {
            return Ok(());
        }

        let root = records
            .iter()
            .find(|r| r.is_category(category::VIRTUAL_HOST))
            .ok_or_else(|| RecoveryError::Graph("no virtual host record".to_string()))?;
        let virtual_host = TestObject::from_record(root);

        let objects: Vec<Arc<TestObject>> = records
            .iter()
            .filter(|r| r.id() != root.id())
            .map(TestObject::from_record)
            .collect();
        for object in &objects {
            let parent_id = object.state.read().parents.get(category::VIRTUAL_HOST).copied();
            let parent = parent_id
                .and_then(|id| objects.iter().find(|o| o.id == id))
                .unwrap_or(&virtual_host);
            parent.adopt(Arc::clone(object));
        }

        self.node.adopt(virtual_host);
        Ok(())
    }

    fn virtual_host(&self) -> Option<ObjectRef> {
        self.test_virtual_host().map(|v| v as ObjectRef)
    }

    fn add_change_listener(&self, listener: ListenerRef) {
        self.node.add_change_listener(listener);
    }

    fn force_update_all_secure_attributes(&self) {
        self.secure_updates.fetch_add(1, Ordering::SeqCst);
    }
}
