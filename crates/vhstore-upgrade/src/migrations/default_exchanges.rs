//! 0.4 → 2.0: synthesize default exchanges and backfill dead-letter exchanges
//!
//! Stores written before 2.0 relied on the broker creating the conventional
//! `amq.*` exchanges at startup; from 2.0 on they are ordinary records. Any
//! that are missing are synthesized with deterministic ids, parented to the
//! virtual host.
//!
//! Queues with the legacy dead-letter toggle but no alternate exchange get
//! `alternateExchange` pointing at the exchange named after the queue plus
//! the configured suffix. The exchange may be visited after the queue, so
//! unresolved queues are deferred to `complete`.

use crate::config::{DefaultExchange, PhaseContext};
use crate::error::{UpgradeError, UpgradeResult};
use crate::phase::{is_root, stage_root_version, UpgradePhase};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use vhstore_record::{attr, category, Record, RecordBuilder, RecordId, StagingSet};

/// Lifetime policy of synthesized exchanges
pub const PERMANENT: &str = "PERMANENT";

/// Default-exchange synthesis phase
#[derive(Debug)]
pub struct DefaultExchanges {
    root_id: Option<RecordId>,
    missing: Vec<DefaultExchange>,
    exchanges: HashMap<String, RecordId>,
    deferred: IndexMap<RecordId, (Record, String)>,
    dead_letter_suffix: String,
}

impl DefaultExchanges {
    /// From-version
    pub const FROM: &'static str = "0.4";
    /// To-version
    pub const TO: &'static str = "2.0";

    /// Begin the phase
    #[must_use]
    pub fn new(ctx: &PhaseContext) -> Self {
        Self {
            root_id: None,
            missing: ctx.default_exchanges().to_vec(),
            exchanges: HashMap::new(),
            deferred: IndexMap::new(),
            dead_letter_suffix: ctx.config().dead_letter_exchange_suffix.clone(),
        }
    }

    fn visit_exchange(&mut self, exchange: &Record) {
        if let Some(name) = exchange.name() {
            self.missing.retain(|e| e.name != name);
            self.exchanges.insert(name.to_string(), exchange.id());
        }
    }

    fn visit_queue(&mut self, queue: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        if !is_dead_letter_enabled(queue) || has_alternate_exchange(queue) {
            return Ok(());
        }

        let name = queue
            .name()
            .filter(|n| !n.is_empty())
            .ok_or(UpgradeError::MissingQueueName { id: queue.id() })?;
        let exchange_name = format!("{name}{}", self.dead_letter_suffix);

        match self.exchanges.get(&exchange_name) {
            Some(&exchange_id) => {
                staging.stage_update(with_alternate_exchange(queue, exchange_id));
            }
            None => {
                self.deferred
                    .insert(queue.id(), (queue.clone(), exchange_name));
            }
        }
        Ok(())
    }

    fn synthesize_missing(&mut self, staging: &mut StagingSet) -> UpgradeResult<()> {
        for exchange in std::mem::take(&mut self.missing) {
            let root_id = self
                .root_id
                .ok_or_else(|| UpgradeError::MissingRootRecord(exchange.name.to_string()))?;
            tracing::debug!("Creating default exchange {}", exchange.name);
            let record = RecordBuilder::with_id(exchange.id, category::EXCHANGE)
                .name(exchange.name)
                .attribute(attr::TYPE, exchange.exchange_type)
                .attribute(attr::LIFETIME_POLICY, PERMANENT)
                .parent(category::VIRTUAL_HOST, root_id)
                .build();
            self.exchanges.insert(exchange.name.to_string(), exchange.id);
            staging.stage_update(record);
        }
        Ok(())
    }
}

fn is_dead_letter_enabled(queue: &Record) -> bool {
    match queue.attribute(attr::DLQ_ENABLED) {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn has_alternate_exchange(queue: &Record) -> bool {
    queue
        .attribute(attr::ALTERNATE_EXCHANGE)
        .is_some_and(|v| !v.is_null())
}

fn with_alternate_exchange(queue: &Record, exchange_id: RecordId) -> Record {
    queue.with_attribute(attr::ALTERNATE_EXCHANGE, exchange_id.to_string())
}

impl UpgradePhase for DefaultExchanges {
    fn from_version(&self) -> &'static str {
        Self::FROM
    }

    fn to_version(&self) -> &'static str {
        Self::TO
    }

    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        if is_root(record) {
            self.root_id = Some(record.id());
            stage_root_version(record, Self::TO, staging);
        } else if record.is_category(category::EXCHANGE) {
            self.visit_exchange(record);
        } else if record.is_category(category::QUEUE) {
            self.visit_queue(record, staging)?;
        }
        Ok(())
    }

    fn complete(&mut self, staging: &mut StagingSet) -> UpgradeResult<()> {
        self.synthesize_missing(staging)?;

        for (_, (queue, exchange_name)) in std::mem::take(&mut self.deferred) {
            match self.exchanges.get(&exchange_name) {
                Some(&exchange_id) => {
                    staging.stage_update(with_alternate_exchange(&queue, exchange_id));
                }
                None => tracing::warn!(
                    "Dead-letter exchange '{}' for {} not found; alternate exchange left unset",
                    exchange_name,
                    queue
                ),
            }
        }
        Ok(())
    }
}
