//! 0.0 → 0.1: strip selector arguments from bindings to non-topic exchanges
//!
//! Older brokers ignored selector arguments on bindings to anything but topic
//! exchanges. From 0.1 on they are enforced, so they are removed here to keep
//! routing unchanged.

use crate::config::PhaseContext;
use crate::error::UpgradeResult;
use crate::filter;
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use indexmap::IndexMap;
use serde_json::Value;
use vhstore_record::{attr, category, Record, RecordId, StagingSet};

/// Selector-pruning phase
///
/// Deciding whether a binding's exchange is a topic exchange needs the
/// exchange record, which may be visited after the binding, so every decision
/// is made in `complete`.
#[derive(Debug)]
pub struct SelectorPruning {
    topic_exchange_id: Option<RecordId>,
    records: IndexMap<RecordId, Record>,
}

impl SelectorPruning {
    /// From-version
    pub const FROM: &'static str = "0.0";
    /// To-version
    pub const TO: &'static str = "0.1";

    /// Begin the phase
    #[must_use]
    pub fn new(ctx: &PhaseContext) -> Self {
        Self {
            topic_exchange_id: ctx.default_exchange("amq.topic").map(|e| e.id),
            records: IndexMap::new(),
        }
    }

    fn is_topic_exchange(&self, binding: &Record) -> bool {
        let Some(exchange_id) = binding.parent(category::EXCHANGE) else {
            return false;
        };
        match self.records.get(&exchange_id) {
            Some(exchange) => exchange.string_attribute(attr::TYPE) == Some("topic"),
            None => self.topic_exchange_id == Some(exchange_id),
        }
    }

    fn has_selector_arguments(binding: &Record) -> bool {
        binding
            .attribute(attr::ARGUMENTS)
            .and_then(Value::as_object)
            .is_some_and(filter::arguments_contain_filter)
    }

    fn without_selector_arguments(binding: &Record) -> Record {
        let mut arguments = binding
            .attribute(attr::ARGUMENTS)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        filter::remove_filters(&mut arguments);
        binding.with_attribute(attr::ARGUMENTS, Value::Object(arguments))
    }
}

impl UpgradePhase for SelectorPruning {
    fn from_version(&self) -> &'static str {
        Self::FROM
    }

    fn to_version(&self) -> &'static str {
        Self::TO
    }

    fn visit(&mut self, record: &Record, _staging: &mut StagingSet) -> UpgradeResult<()> {
        self.records.insert(record.id(), record.clone());
        Ok(())
    }

    fn complete(&mut self, staging: &mut StagingSet) -> UpgradeResult<()> {
        for record in self.records.values() {
            if is_root(record) {
                stage_root_version(record, Self::TO, staging);
            } else if record.is_category(category::BINDING)
                && Self::has_selector_arguments(record)
                && !self.is_topic_exchange(record)
            {
                tracing::debug!("Removing selector arguments from {}", record);
                staging.stage_update(Self::without_selector_arguments(record));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpgradeConfig;
    use crate::filter::JMS_SELECTOR;
    use serde_json::json;
    use vhstore_record::RecordBuilder;

    const BINDING: &str = "org.apache.qpid.server.model.Binding";
    const EXCHANGE: &str = "org.apache.qpid.server.model.Exchange";

    fn run(ctx: &PhaseContext, records: &[Record]) -> StagingSet {
        let mut phase = SelectorPruning::new(ctx);
        let mut staging = StagingSet::new();
        for record in records {
            phase.visit(record, &mut staging).unwrap();
        }
        phase.complete(&mut staging).unwrap();
        staging
    }

    fn binding_to(exchange_id: RecordId) -> Record {
        RecordBuilder::new(BINDING)
            .name("key")
            .attribute(attr::ARGUMENTS, json!({JMS_SELECTOR: "colour = 'red'", "x-match": "any"}))
            .parent(category::EXCHANGE, exchange_id)
            .parent(category::QUEUE, RecordId::new_v4())
            .build()
    }

    #[test]
    fn binding_visited_before_its_exchange_is_still_resolved() {
        let ctx = PhaseContext::new(UpgradeConfig::new("vh"));
        let exchange = RecordBuilder::new(EXCHANGE).attribute(attr::TYPE, "topic").build();
        let binding = binding_to(exchange.id());

        let staging = run(&ctx, &[binding.clone(), exchange]);

        assert!(!staging.has_update(binding.id()));
    }

    #[test]
    fn unknown_exchange_matching_default_topic_id_is_topic() {
        let ctx = PhaseContext::new(UpgradeConfig::new("vh"));
        let topic_id = ctx.default_exchange("amq.topic").unwrap().id;
        let binding = binding_to(topic_id);

        let staging = run(&ctx, &[binding.clone()]);

        assert!(!staging.has_update(binding.id()));
    }

    #[test]
    fn unknown_non_default_exchange_is_not_topic() {
        let ctx = PhaseContext::new(UpgradeConfig::new("vh"));
        let binding = binding_to(RecordId::new_v4());

        let staging = run(&ctx, &[binding.clone()]);

        let updated = staging.staged_update(binding.id()).unwrap();
        assert_eq!(updated.attribute(attr::ARGUMENTS), Some(&json!({"x-match": "any"})));
    }
}
