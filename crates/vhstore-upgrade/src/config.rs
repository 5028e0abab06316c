//! Upgrade configuration
//!
//! [`UpgradeConfig`] carries the values the upgrade chain needs from the
//! hosting broker; [`PhaseContext`] is the per-upgrader derived view handed to
//! each phase when it begins.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vhstore_record::{category, RecordId};

/// Environment variable overriding the dead-letter exchange suffix
pub const DEAD_LETTER_SUFFIX_ENV: &str = "VHSTORE_DEAD_LETTER_EXCHANGE_SUFFIX";

/// Suffix appended to a queue name to form its legacy dead-letter exchange name
pub const DEFAULT_DEAD_LETTER_SUFFIX: &str = "_DLE";

/// Conventional default exchanges as `(name, exchange type)`
pub const DEFAULT_EXCHANGES: [(&str, &str); 4] = [
    ("amq.direct", "direct"),
    ("amq.topic", "topic"),
    ("amq.fanout", "fanout"),
    ("amq.match", "headers"),
];

/// Upgrade configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpgradeConfig {
    /// Name of the virtual host whose store is upgraded
    pub virtual_host_name: String,
    /// Suffix for derived dead-letter exchange names
    pub dead_letter_exchange_suffix: String,
}

impl UpgradeConfig {
    /// Create configuration for a virtual host
    #[inline]
    #[must_use]
    pub fn new(virtual_host_name: impl Into<String>) -> Self {
        Self {
            virtual_host_name: virtual_host_name.into(),
            ..Self::default()
        }
    }

    /// Create configuration, taking the dead-letter suffix from
    /// [`DEAD_LETTER_SUFFIX_ENV`] when set
    #[must_use]
    pub fn from_env(virtual_host_name: impl Into<String>) -> Self {
        let config = Self::new(virtual_host_name);
        match std::env::var(DEAD_LETTER_SUFFIX_ENV) {
            Ok(suffix) if !suffix.is_empty() => config.with_dead_letter_exchange_suffix(suffix),
            _ => config,
        }
    }

    /// With dead-letter exchange suffix
    #[inline]
    #[must_use]
    pub fn with_dead_letter_exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dead_letter_exchange_suffix = suffix.into();
        self
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            virtual_host_name: "default".to_string(),
            dead_letter_exchange_suffix: DEFAULT_DEAD_LETTER_SUFFIX.to_string(),
        }
    }
}

/// A conventional default exchange with its deterministic id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultExchange {
    /// Exchange name, e.g. `amq.topic`
    pub name: &'static str,
    /// Exchange type, e.g. `topic`
    pub exchange_type: &'static str,
    /// Id the exchange has (or will have) in this virtual host
    pub id: RecordId,
}

/// Deterministic id of a named exchange within a virtual host
///
/// Name-based, so every run over the same virtual host yields the same id.
#[must_use]
pub fn exchange_id(virtual_host_name: &str, exchange_name: &str) -> RecordId {
    let key = format!(
        "{}/{}/{}",
        category::EXCHANGE,
        virtual_host_name,
        exchange_name
    );
    Uuid::new_v3(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// Values shared by all phases of one upgrader
#[derive(Debug, Clone)]
pub struct PhaseContext {
    config: UpgradeConfig,
    default_exchanges: Vec<DefaultExchange>,
}

impl PhaseContext {
    /// Derive the context from configuration
    #[must_use]
    pub fn new(config: UpgradeConfig) -> Self {
        let default_exchanges = DEFAULT_EXCHANGES
            .iter()
            .map(|&(name, exchange_type)| DefaultExchange {
                name,
                exchange_type,
                id: exchange_id(&config.virtual_host_name, name),
            })
            .collect();
        Self {
            config,
            default_exchanges,
        }
    }

    /// Source configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// All default exchanges
    #[inline]
    #[must_use]
    pub fn default_exchanges(&self) -> &[DefaultExchange] {
        &self.default_exchanges
    }

    /// Default exchange by name
    #[must_use]
    pub fn default_exchange(&self, name: &str) -> Option<&DefaultExchange> {
        self.default_exchanges.iter().find(|e| e.name == name)
    }

    /// Whether an id belongs to a default exchange
    #[must_use]
    pub fn is_default_exchange_id(&self, id: RecordId) -> bool {
        self.default_exchanges.iter().any(|e| e.id == id)
    }

    /// Legacy dead-letter exchange name for a queue
    #[inline]
    #[must_use]
    pub fn dead_letter_exchange_name(&self, queue_name: &str) -> String {
        format!("{queue_name}{}", self.config.dead_letter_exchange_suffix)
    }
}
