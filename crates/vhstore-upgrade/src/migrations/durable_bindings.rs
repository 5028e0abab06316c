//! 6.1 → 7.0: consolidate bindings onto their exchanges
//!
//! Before 7.0 a binding could be persisted three ways:
//! - as a standalone `Binding` record with `Exchange` and `Queue` parents,
//! - inline in an exchange's `bindings` list (`name`, `queue`, `arguments`),
//! - inline in a queue's `bindings` list (`name`, `exchange`, `arguments`).
//!
//! From 7.0 every binding lives in its exchange's `durableBindings` list as
//! `{bindingKey, destination, arguments?}`. Standalone binding records are
//! deleted and inline lists removed.
//!
//! Queue-inline bindings name their exchange by id or by name, so they are
//! folded in only once every exchange has been indexed.

use crate::error::{UpgradeError, UpgradeResult};
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use vhstore_record::{attr, category, Record, RecordId, StagingSet};

/// One binding captured from any of the three legacy representations
#[derive(Debug, Clone, PartialEq)]
struct BindingDescriptor {
    binding_key: String,
    /// Queue id as text, or a queue name
    queue: String,
    arguments: Option<Value>,
}

impl BindingDescriptor {
    fn new(binding_key: String, queue: String, arguments: Option<&Value>) -> Self {
        Self {
            binding_key,
            queue,
            arguments: arguments.filter(|v| !v.is_null()).cloned(),
        }
    }
}

/// Binding consolidation phase
#[derive(Debug, Default)]
pub struct DurableBindings {
    exchange_bindings: IndexMap<RecordId, Vec<BindingDescriptor>>,
    exchanges: IndexMap<RecordId, Record>,
    queues: HashMap<RecordId, String>,
    queue_bindings: IndexMap<String, Vec<Value>>,
}

/// Attribute value as text; missing and null become empty
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn inline_bindings(record: &Record) -> Vec<Value> {
    record
        .attribute(attr::BINDINGS)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

impl DurableBindings {
    /// From-version
    pub const FROM: &'static str = "6.1";
    /// To-version
    pub const TO: &'static str = "7.0";

    fn visit_binding(&mut self, binding: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        let unresolved = |parent| UpgradeError::UnresolvedParent {
            id: binding.id(),
            category: binding.category().to_string(),
            parent,
        };
        let exchange_id = binding
            .parent(category::EXCHANGE)
            .ok_or_else(|| unresolved(category::EXCHANGE))?;
        let queue_id = binding
            .parent(category::QUEUE)
            .ok_or_else(|| unresolved(category::QUEUE))?;

        self.exchange_bindings
            .entry(exchange_id)
            .or_default()
            .push(BindingDescriptor::new(
                text(binding.attribute(attr::NAME)),
                queue_id.to_string(),
                binding.attribute(attr::ARGUMENTS),
            ));
        staging.stage_delete(binding.clone());
        Ok(())
    }

    fn visit_exchange(&mut self, exchange: &Record) {
        self.exchanges.insert(exchange.id(), exchange.clone());
        if !exchange.has_attribute(attr::BINDINGS) {
            return;
        }
        let captured = self.exchange_bindings.entry(exchange.id()).or_default();
        for entry in inline_bindings(exchange) {
            captured.push(BindingDescriptor::new(
                text(entry.get(attr::NAME)),
                text(entry.get(attr::QUEUE)),
                entry.get(attr::ARGUMENTS),
            ));
        }
    }

    fn visit_queue(&mut self, queue: &Record, staging: &mut StagingSet) {
        let name = text(queue.attribute(attr::NAME));
        self.queues.insert(queue.id(), name.clone());
        if queue.has_attribute(attr::BINDINGS) {
            self.queue_bindings
                .entry(name)
                .or_default()
                .extend(inline_bindings(queue));
            staging.stage_update(queue.without_attribute(attr::BINDINGS));
        }
    }

    /// Resolve an exchange reference from a queue-inline binding
    ///
    /// Tries, in order: id of an indexed exchange, name of an indexed
    /// exchange, any well-formed id.
    fn resolve_exchange(&self, queue: &str, reference: &str) -> UpgradeResult<RecordId> {
        let parsed = RecordId::parse_str(reference).ok();
        if let Some(id) = parsed.filter(|id| self.exchanges.contains_key(id)) {
            return Ok(id);
        }
        if let Some(exchange) = self
            .exchanges
            .values()
            .find(|e| e.name() == Some(reference))
        {
            return Ok(exchange.id());
        }
        parsed.ok_or_else(|| UpgradeError::UnresolvedExchange {
            queue: queue.to_string(),
            reference: reference.to_string(),
        })
    }

    /// Current name of the queue a binding points at
    ///
    /// A reference that parses as the id of a known queue becomes that queue's
    /// name; anything else is taken as a name.
    fn destination(&self, queue: &str) -> String {
        RecordId::parse_str(queue)
            .ok()
            .and_then(|id| self.queues.get(&id))
            .map_or_else(|| queue.to_string(), Clone::clone)
    }

    fn fold_queue_bindings(&mut self) -> UpgradeResult<()> {
        for (queue, entries) in std::mem::take(&mut self.queue_bindings) {
            for entry in entries {
                let exchange_id = self.resolve_exchange(&queue, &text(entry.get(attr::EXCHANGE)))?;
                self.exchange_bindings
                    .entry(exchange_id)
                    .or_default()
                    .push(BindingDescriptor::new(
                        text(entry.get(attr::NAME)),
                        queue.clone(),
                        entry.get(attr::ARGUMENTS),
                    ));
            }
        }
        Ok(())
    }

    fn durable_binding(&self, descriptor: &BindingDescriptor) -> Value {
        let mut binding = Map::new();
        binding.insert(
            attr::BINDING_KEY.to_string(),
            Value::from(descriptor.binding_key.clone()),
        );
        binding.insert(
            attr::DESTINATION.to_string(),
            Value::from(self.destination(&descriptor.queue)),
        );
        if let Some(arguments) = &descriptor.arguments {
            binding.insert(attr::ARGUMENTS.to_string(), arguments.clone());
        }
        Value::Object(binding)
    }
}

impl UpgradePhase for DurableBindings {
    fn from_version(&self) -> &'static str {
        Self::FROM
    }

    fn to_version(&self) -> &'static str {
        Self::TO
    }

    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        if is_root(record) {
            stage_root_version(record, Self::TO, staging);
        } else if record.is_category(category::BINDING) {
            self.visit_binding(record, staging)?;
        } else if record.is_category(category::EXCHANGE) {
            self.visit_exchange(record);
        } else if record.is_category(category::QUEUE) {
            self.visit_queue(record, staging);
        }
        Ok(())
    }

    fn complete(&mut self, staging: &mut StagingSet) -> UpgradeResult<()> {
        self.fold_queue_bindings()?;

        for (exchange_id, descriptors) in &self.exchange_bindings {
            let Some(exchange) = self.exchanges.get(exchange_id) else {
                tracing::warn!(
                    "Dropping {} binding(s) for unknown exchange {}",
                    descriptors.len(),
                    exchange_id
                );
                continue;
            };
            let durable: Vec<Value> = descriptors
                .iter()
                .map(|d| self.durable_binding(d))
                .collect();
            tracing::debug!("Consolidated {} binding(s) onto {}", durable.len(), exchange);
            let mut attributes = exchange.attributes().clone();
            attributes.shift_remove(attr::BINDINGS);
            attributes.insert(attr::DURABLE_BINDINGS.to_string(), Value::Array(durable));
            staging.stage_update(exchange.with_attributes(attributes));
        }
        Ok(())
    }
}
