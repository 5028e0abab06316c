//! The closed set of upgrade steps
//!
//! Provides [`Migration`], one variant per behaviour, and [`STANDARD_CHAIN`],
//! the ordered sequence that takes a store from the oldest known model
//! version to [`MODEL_VERSION`].

use crate::config::PhaseContext;
use crate::migrations::{
    DefaultExchanges, DurableBindings, ExclusivityPolicy, QueueArgumentFlattening,
    SelectorPruning, TypeNameNormalization, VersionBump,
};
use crate::phase::UpgradePhase;

/// Model version assumed when the root record carries none
pub const INITIAL_MODEL_VERSION: &str = "0.0";

/// Model version the running broker understands
pub const MODEL_VERSION: &str = "7.0";

/// One version-to-version step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// 0.0 → 0.1: drop selectors on bindings to non-topic exchanges
    SelectorPruning,

    /// 0.1 → 0.2: short category tags, orphan bindings deleted
    TypeNameNormalization,

    /// 0.2 → 0.3: queue wire arguments promoted to attributes
    QueueArgumentFlattening,

    /// 0.3 → 0.4: boolean exclusivity to exclusivity policy
    ExclusivityPolicy,

    /// 0.4 → 2.0: default exchanges and dead-letter backfill
    DefaultExchanges,

    /// Root version tag only
    VersionBump {
        /// From-version
        from: &'static str,
        /// To-version
        to: &'static str,
    },

    /// 6.1 → 7.0: bindings consolidated onto exchanges
    DurableBindings,
}

/// Ordered standard chain from [`INITIAL_MODEL_VERSION`] to [`MODEL_VERSION`]
pub const STANDARD_CHAIN: [Migration; 9] = [
    Migration::SelectorPruning,
    Migration::TypeNameNormalization,
    Migration::QueueArgumentFlattening,
    Migration::ExclusivityPolicy,
    Migration::DefaultExchanges,
    Migration::VersionBump {
        from: "2.0",
        to: "3.0",
    },
    Migration::VersionBump {
        from: "3.0",
        to: "6.0",
    },
    Migration::VersionBump {
        from: "6.0",
        to: "6.1",
    },
    Migration::DurableBindings,
];

impl Migration {
    /// Model version this step upgrades from
    #[must_use]
    pub const fn from_version(&self) -> &'static str {
        match self {
            Self::SelectorPruning => SelectorPruning::FROM,
            Self::TypeNameNormalization => TypeNameNormalization::FROM,
            Self::QueueArgumentFlattening => QueueArgumentFlattening::FROM,
            Self::ExclusivityPolicy => ExclusivityPolicy::FROM,
            Self::DefaultExchanges => DefaultExchanges::FROM,
            Self::VersionBump { from, .. } => *from,
            Self::DurableBindings => DurableBindings::FROM,
        }
    }

    /// Model version this step produces
    #[must_use]
    pub const fn to_version(&self) -> &'static str {
        match self {
            Self::SelectorPruning => SelectorPruning::TO,
            Self::TypeNameNormalization => TypeNameNormalization::TO,
            Self::QueueArgumentFlattening => QueueArgumentFlattening::TO,
            Self::ExclusivityPolicy => ExclusivityPolicy::TO,
            Self::DefaultExchanges => DefaultExchanges::TO,
            Self::VersionBump { to, .. } => *to,
            Self::DurableBindings => DurableBindings::TO,
        }
    }

    /// Step name (for logging)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectorPruning => "selector_pruning",
            Self::TypeNameNormalization => "type_name_normalization",
            Self::QueueArgumentFlattening => "queue_argument_flattening",
            Self::ExclusivityPolicy => "exclusivity_policy",
            Self::DefaultExchanges => "default_exchanges",
            Self::VersionBump { .. } => "version_bump",
            Self::DurableBindings => "durable_bindings",
        }
    }

    /// Begin a run of this step with empty phase-local state
    #[must_use]
    pub fn begin(&self, ctx: &PhaseContext) -> Box<dyn UpgradePhase> {
        match *self {
            Self::SelectorPruning => Box::new(SelectorPruning::new(ctx)),
            Self::TypeNameNormalization => Box::new(TypeNameNormalization::new(ctx)),
            Self::QueueArgumentFlattening => Box::new(QueueArgumentFlattening),
            Self::ExclusivityPolicy => Box::new(ExclusivityPolicy),
            Self::DefaultExchanges => Box::new(DefaultExchanges::new(ctx)),
            Self::VersionBump { from, to } => Box::new(VersionBump::new(from, to)),
            Self::DurableBindings => Box::new(DurableBindings::default()),
        }
    }
}
