//! Error types for stores and recovery

use vhstore_record::RecordId;
use vhstore_upgrade::UpgradeError;

/// Configuration store error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store used before it was opened
    #[error("configuration store is not open")]
    NotOpen,

    /// Update without create of a record the store does not hold
    #[error("record {0} does not exist in the configuration store")]
    UnknownRecord(RecordId),

    /// Create of a record the store already holds
    #[error("record {0} already exists in the configuration store")]
    DuplicateRecord(RecordId),

    /// Storage backend failure
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Recovery error
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Upgrading the persisted records failed
    #[error("upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),

    /// Reading from or writing to the store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The object graph could not be rebuilt from the records
    #[error("graph recovery failed: {0}")]
    Graph(String),
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts() {
        let err: RecoveryError = StoreError::NotOpen.into();
        assert!(matches!(err, RecoveryError::Store(StoreError::NotOpen)));
    }

    #[test]
    fn upgrade_error_converts() {
        let err: RecoveryError = UpgradeError::BrokenChain("gap".into()).into();
        assert_eq!(err.to_string(), "upgrade failed: broken upgrade chain: gap");
    }
}
