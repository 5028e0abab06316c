//! Error types for the upgrade chain
//!
//! Every variant is fatal: an upgrade either reaches the target model version
//! or the broker does not start. Recoverable data-quality problems (orphaned
//! bindings, unresolvable dead-letter exchanges) are logged, not returned.

use vhstore_record::RecordId;

/// Upgrade error
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// A record references a parent that cannot be resolved
    #[error("{category} record {id} has no {parent} parent")]
    UnresolvedParent {
        /// Offending record
        id: RecordId,
        /// Its category tag
        category: String,
        /// Parent category that is missing
        parent: &'static str,
    },

    /// An inline binding names an exchange that is neither a known name nor an id
    #[error("binding on queue '{queue}' references unknown exchange '{reference}'")]
    UnresolvedExchange {
        /// Queue carrying the inline binding
        queue: String,
        /// Exchange reference as written
        reference: String,
    },

    /// A queue needs a name to derive a related resource name
    #[error("queue {id} has no name in its configuration attributes")]
    MissingQueueName {
        /// Offending queue
        id: RecordId,
    },

    /// Synthesis needs a virtual host record to parent new records
    #[error("no virtual host record to parent synthesized exchange '{0}'")]
    MissingRootRecord(String),

    /// The configured phase chain is not contiguous or does not reach the target
    #[error("broken upgrade chain: {0}")]
    BrokenChain(String),

    /// No phase starts at the declared model version
    #[error("no upgrade phase from model version '{version}' (target '{target}')")]
    UnsupportedVersion {
        /// Declared version
        version: String,
        /// Target model version
        target: String,
    },

    /// The root record's version attribute is not a string
    #[error("model version attribute is not a string: {0}")]
    UnreadableVersion(serde_json::Value),

    /// Persisting a committed phase failed
    #[error("failed to persist phase {from} -> {to}")]
    Sink {
        /// Phase from-version
        from: &'static str,
        /// Phase to-version
        to: &'static str,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl UpgradeError {
    /// Whether this error reflects invalid persisted configuration (as opposed
    /// to a failure persisting the result)
    #[inline]
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Sink { .. })
    }
}

/// Result alias for upgrade operations
pub type UpgradeResult<T> = Result<T, UpgradeError>;
