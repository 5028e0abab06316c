//! Record fixtures for stores written by older brokers

use serde_json::json;
use vhstore_record::{attr, category, Record, RecordBuilder};
use vhstore_upgrade::{exchange_id, MODEL_VERSION};

/// Virtual host name used by every fixture
pub const VIRTUAL_HOST_NAME: &str = "test";

/// Fully qualified category tag, as written before 0.2
#[must_use]
pub fn qualified(short: &str) -> String {
    category::qualified_name(short)
}

/// Root record, optionally carrying a model version
#[must_use]
pub fn virtual_host(version: Option<&str>) -> Record {
    let builder = RecordBuilder::new(category::VIRTUAL_HOST).name(VIRTUAL_HOST_NAME);
    match version {
        Some(v) => builder.attribute(attr::MODEL_VERSION, v),
        None => builder,
    }
    .build()
}

/// A store as written at model version 0.0
///
/// Fully qualified categories, a binding with a selector on a direct
/// exchange, one on the default topic exchange, one binding whose queue is
/// gone and a queue with wire arguments and boolean exclusivity.
#[derive(Debug, Clone)]
pub struct LegacyStore {
    /// Root without a version attribute
    pub root: Record,
    /// Direct exchange
    pub direct_exchange: Record,
    /// Queue with wire arguments, `exclusive: false` and an owner
    pub queue: Record,
    /// Dead-letter-enabled queue whose exchange is missing
    pub dead_letter_queue: Record,
    /// Selector binding to the direct exchange
    pub direct_binding: Record,
    /// Selector binding to the default topic exchange
    pub topic_binding: Record,
    /// Binding whose queue does not exist
    pub orphan_binding: Record,
}

impl LegacyStore {
    /// Build the fixture
    #[must_use]
    pub fn new() -> Self {
        let root = RecordBuilder::new(qualified(category::VIRTUAL_HOST))
            .name(VIRTUAL_HOST_NAME)
            .build();
        let direct_exchange = RecordBuilder::new(qualified(category::EXCHANGE))
            .name("orders.direct")
            .attribute(attr::TYPE, "direct")
            .parent(category::VIRTUAL_HOST, root.id())
            .build();
        let queue = RecordBuilder::new(qualified(category::QUEUE))
            .name("orders")
            .attribute(attr::EXCLUSIVE, false)
            .attribute(attr::OWNER, "alice")
            .attribute(
                attr::ARGUMENTS,
                json!({"x-qpid-priorities": 10, "qpid.shared_msg_group": "1"}),
            )
            .parent(category::VIRTUAL_HOST, root.id())
            .build();
        let dead_letter_queue = RecordBuilder::new(qualified(category::QUEUE))
            .name("payments")
            .attribute(attr::EXCLUSIVE, true)
            .attribute(attr::ARGUMENTS, json!({"x-qpid-dlq-enabled": true}))
            .parent(category::VIRTUAL_HOST, root.id())
            .build();
        let selector = json!({"x-filter-jms-selector": "priority > 5"});
        let direct_binding = RecordBuilder::new(qualified(category::BINDING))
            .name("orders.key")
            .attribute(attr::ARGUMENTS, selector.clone())
            .parent(category::EXCHANGE, direct_exchange.id())
            .parent(category::QUEUE, queue.id())
            .build();
        let topic_binding = RecordBuilder::new(qualified(category::BINDING))
            .name("orders.#")
            .attribute(attr::ARGUMENTS, selector)
            .parent(category::EXCHANGE, exchange_id(VIRTUAL_HOST_NAME, "amq.topic"))
            .parent(category::QUEUE, queue.id())
            .build();
        let orphan_binding = RecordBuilder::new(qualified(category::BINDING))
            .name("gone")
            .parent(category::EXCHANGE, direct_exchange.id())
            .parent(category::QUEUE, vhstore_record::RecordId::new_v4())
            .build();

        Self {
            root,
            direct_exchange,
            queue,
            dead_letter_queue,
            direct_binding,
            topic_binding,
            orphan_binding,
        }
    }

    /// All records, bindings first
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        vec![
            self.orphan_binding.clone(),
            self.topic_binding.clone(),
            self.direct_binding.clone(),
            self.queue.clone(),
            self.dead_letter_queue.clone(),
            self.direct_exchange.clone(),
            self.root.clone(),
        ]
    }
}

impl Default for LegacyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A store at model version 6.1 holding one binding in each legacy form
///
/// All three bind queue `q` to exchange `ex`.
#[derive(Debug, Clone)]
pub struct BindingModelStore {
    /// Root at 6.1
    pub root: Record,
    /// Exchange with one inline binding
    pub exchange: Record,
    /// Queue with one inline binding naming the exchange by name
    pub queue: Record,
    /// Standalone binding record
    pub binding: Record,
}

impl BindingModelStore {
    /// Build the fixture
    #[must_use]
    pub fn new() -> Self {
        let root = virtual_host(Some("6.1"));
        let queue_id = vhstore_record::RecordId::new_v4();
        let exchange = RecordBuilder::new(category::EXCHANGE)
            .name("ex")
            .attribute(attr::TYPE, "direct")
            .attribute(
                attr::BINDINGS,
                json!([{"name": "inline", "queue": queue_id.to_string()}]),
            )
            .parent(category::VIRTUAL_HOST, root.id())
            .build();
        let queue = RecordBuilder::with_id(queue_id, category::QUEUE)
            .name("q")
            .attribute(
                attr::BINDINGS,
                json!([{"name": "from-queue", "exchange": "ex", "arguments": {"x-match": "any"}}]),
            )
            .parent(category::VIRTUAL_HOST, root.id())
            .build();
        let binding = RecordBuilder::new(category::BINDING)
            .name("standalone")
            .parent(category::EXCHANGE, exchange.id())
            .parent(category::QUEUE, queue_id)
            .build();

        Self {
            root,
            exchange,
            queue,
            binding,
        }
    }

    /// All records
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        vec![
            self.root.clone(),
            self.binding.clone(),
            self.queue.clone(),
            self.exchange.clone(),
        ]
    }
}

impl Default for BindingModelStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A small store already at the current model version
#[must_use]
pub fn current_store() -> Vec<Record> {
    let root = virtual_host(Some(MODEL_VERSION));
    let queue = RecordBuilder::new(category::QUEUE)
        .name("q")
        .attribute(attr::DURABLE, true)
        .parent(category::VIRTUAL_HOST, root.id())
        .build();
    let exchange = RecordBuilder::new(category::EXCHANGE)
        .name("ex")
        .attribute(attr::TYPE, "fanout")
        .attribute(
            attr::DURABLE_BINDINGS,
            json!([{"bindingKey": "k", "destination": "q"}]),
        )
        .parent(category::VIRTUAL_HOST, root.id())
        .build();
    vec![root, queue, exchange]
}
