//! 0.1 → 0.2: short category tags and orphan-binding pruning
//!
//! Rewrites `org.apache.qpid.server.model.Foo` to `Foo`, then deletes every
//! binding whose exchange or queue parent is not a live record of the
//! expected category. Dangling bindings are deleted, never repaired.

use crate::config::PhaseContext;
use crate::error::UpgradeResult;
use crate::phase::{stage_root_version, UpgradePhase};
use std::collections::HashSet;
use vhstore_record::{category, Record, RecordId, StagingSet};

/// Type-name normalization phase
#[derive(Debug)]
pub struct TypeNameNormalization {
    default_exchange_ids: HashSet<RecordId>,
}

impl TypeNameNormalization {
    /// From-version
    pub const FROM: &'static str = "0.1";
    /// To-version
    pub const TO: &'static str = "0.2";

    /// Begin the phase
    #[must_use]
    pub fn new(ctx: &PhaseContext) -> Self {
        Self {
            default_exchange_ids: ctx.default_exchanges().iter().map(|e| e.id).collect(),
        }
    }

    fn is_known_exchange(&self, staging: &StagingSet, id: RecordId) -> bool {
        self.default_exchange_ids.contains(&id)
            || staging
                .staged_update(id)
                .is_some_and(|r| r.category() == category::EXCHANGE)
    }

    fn is_known_queue(staging: &StagingSet, id: RecordId) -> bool {
        staging
            .staged_update(id)
            .is_some_and(|r| r.category() == category::QUEUE)
    }

    fn is_orphan(&self, staging: &StagingSet, binding: &Record) -> bool {
        let exchange_ok = binding
            .parent(category::EXCHANGE)
            .is_some_and(|id| self.is_known_exchange(staging, id));
        let queue_ok = binding
            .parent(category::QUEUE)
            .is_some_and(|id| Self::is_known_queue(staging, id));
        !(exchange_ok && queue_ok)
    }
}

impl UpgradePhase for TypeNameNormalization {
    fn from_version(&self) -> &'static str {
        Self::FROM
    }

    fn to_version(&self) -> &'static str {
        Self::TO
    }

    fn visit(&mut self, record: &Record, staging: &mut StagingSet) -> UpgradeResult<()> {
        let short = category::short_name(record.category()).to_string();
        let renamed = record.with_category(short);
        if renamed.category() == category::VIRTUAL_HOST {
            stage_root_version(&renamed, Self::TO, staging);
        } else {
            staging.stage_update(renamed);
        }
        Ok(())
    }

    fn complete(&mut self, staging: &mut StagingSet) -> UpgradeResult<()> {
        let staged: &StagingSet = staging;
        let orphans: Vec<Record> = staged
            .updates()
            .filter(|r| r.category() == category::BINDING && self.is_orphan(staged, r))
            .cloned()
            .collect();

        for binding in orphans {
            tracing::warn!("Deleting binding {} with missing exchange or queue", binding);
            staging.stage_delete(binding);
        }
        Ok(())
    }
}
