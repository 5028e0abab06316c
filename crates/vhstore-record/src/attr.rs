//! Attribute keys shared by the upgrade phases and the recovery layer

/// Entity name
pub const NAME: &str = "name";

/// Exchange type (`direct`, `topic`, `fanout`, `headers`)
pub const TYPE: &str = "type";

/// Schema version tag carried by the root record
pub const MODEL_VERSION: &str = "modelVersion";

/// Nested argument mapping of queues and bindings
pub const ARGUMENTS: &str = "arguments";

/// Inline binding list on exchanges and queues (pre 7.0)
pub const BINDINGS: &str = "bindings";

/// Consolidated binding list on exchanges (7.0)
pub const DURABLE_BINDINGS: &str = "durableBindings";

/// Alternate exchange id of a queue
pub const ALTERNATE_EXCHANGE: &str = "alternateExchange";

/// Queue exclusivity flag / policy
pub const EXCLUSIVE: &str = "exclusive";

/// Owner of an exclusive queue
pub const OWNER: &str = "owner";

/// Durability flag
pub const DURABLE: &str = "durable";

/// Lifetime policy of an entity
pub const LIFETIME_POLICY: &str = "lifetimePolicy";

/// Legacy per-queue dead-letter toggle
pub const DLQ_ENABLED: &str = "x-qpid-dlq-enabled";

/// Binding descriptor key: routing key the binding was created with
pub const BINDING_KEY: &str = "bindingKey";

/// Binding descriptor key: destination queue name
pub const DESTINATION: &str = "destination";

/// Inline binding key: queue reference (id or name)
pub const QUEUE: &str = "queue";

/// Inline binding key: exchange reference (id or name)
pub const EXCHANGE: &str = "exchange";
