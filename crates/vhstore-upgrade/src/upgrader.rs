//! Chain orchestrator
//!
//! [`StoreUpgrader`] reads the root record's model version, then repeatedly
//! selects the step starting at that version, runs its visit and complete
//! passes over the current record set, and commits the result, until the
//! target version is reached.
//!
//! Each committed phase is handed to a [`PhaseSink`] so callers can persist
//! the store one phase at a time.

use crate::config::{PhaseContext, UpgradeConfig};
use crate::error::{UpgradeError, UpgradeResult};
use crate::migration::{Migration, INITIAL_MODEL_VERSION, MODEL_VERSION, STANDARD_CHAIN};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::convert::Infallible;
use vhstore_record::{attr, Record, RecordId, RecordSet, StagingSet};

/// Changes committed by one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCommit {
    from: &'static str,
    to: &'static str,
    updates: Vec<Record>,
    deletes: Vec<Record>,
}

impl PhaseCommit {
    fn new(migration: Migration, staging: StagingSet) -> Self {
        let (updates, deletes) = staging.into_parts();
        Self {
            from: migration.from_version(),
            to: migration.to_version(),
            updates,
            deletes,
        }
    }

    /// Phase from-version
    #[inline]
    #[must_use]
    pub fn from_version(&self) -> &'static str {
        self.from
    }

    /// Phase to-version
    #[inline]
    #[must_use]
    pub fn to_version(&self) -> &'static str {
        self.to
    }

    /// Records created or replaced
    #[inline]
    #[must_use]
    pub fn updates(&self) -> &[Record] {
        &self.updates
    }

    /// Records removed
    #[inline]
    #[must_use]
    pub fn deletes(&self) -> &[Record] {
        &self.deletes
    }
}

/// Receiver of committed phases
pub trait PhaseSink {
    /// Failure persisting a phase
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist one committed phase
    ///
    /// # Errors
    /// Returns error if the phase could not be persisted; the upgrade aborts
    fn commit(&mut self, commit: &PhaseCommit) -> Result<(), Self::Error>;
}

/// Sink that discards every commit
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl PhaseSink for DiscardSink {
    type Error = Infallible;

    fn commit(&mut self, _commit: &PhaseCommit) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Result of running the chain
#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    records: RecordSet,
    updates: IndexMap<RecordId, Record>,
    deletes: IndexMap<RecordId, Record>,
    source_version: String,
    final_version: String,
    steps: Vec<(&'static str, &'static str)>,
}

impl UpgradeOutcome {
    fn new(records: RecordSet, version: String) -> Self {
        Self {
            records,
            updates: IndexMap::new(),
            deletes: IndexMap::new(),
            source_version: version.clone(),
            final_version: version,
            steps: Vec::new(),
        }
    }

    fn record_commit(&mut self, commit: &PhaseCommit) {
        for record in commit.deletes() {
            self.updates.shift_remove(&record.id());
            self.deletes.insert(record.id(), record.clone());
        }
        for record in commit.updates() {
            self.deletes.shift_remove(&record.id());
            self.updates.insert(record.id(), record.clone());
        }
        self.steps.push((commit.from_version(), commit.to_version()));
        self.final_version = commit.to_version().to_string();
    }

    /// Final record set
    #[inline]
    #[must_use]
    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    /// Consume the outcome, yielding the final records in order
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_records()
    }

    /// Every record created or replaced across all phases (latest version)
    pub fn updates(&self) -> impl Iterator<Item = &Record> {
        self.updates.values()
    }

    /// Every record removed across all phases
    pub fn deletes(&self) -> impl Iterator<Item = &Record> {
        self.deletes.values()
    }

    /// Model version the records declared before upgrading
    #[inline]
    #[must_use]
    pub fn source_version(&self) -> &str {
        &self.source_version
    }

    /// Model version reached
    #[inline]
    #[must_use]
    pub fn final_version(&self) -> &str {
        &self.final_version
    }

    /// Applied steps as `(from, to)`
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[(&'static str, &'static str)] {
        &self.steps
    }

    /// Whether nothing was changed
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Upgrades a record set along a chain of migrations
#[derive(Debug, Clone)]
pub struct StoreUpgrader {
    chain: Vec<Migration>,
    target: &'static str,
    ctx: PhaseContext,
}

impl StoreUpgrader {
    /// Upgrader over [`STANDARD_CHAIN`] targeting [`MODEL_VERSION`]
    #[must_use]
    pub fn new(config: UpgradeConfig) -> Self {
        Self {
            chain: STANDARD_CHAIN.to_vec(),
            target: MODEL_VERSION,
            ctx: PhaseContext::new(config),
        }
    }

    /// Upgrader over a custom chain
    ///
    /// # Errors
    /// Returns [`UpgradeError::BrokenChain`] if the chain is empty, not
    /// contiguous, has two steps from the same version, or does not end at
    /// `target`
    pub fn with_chain(
        chain: impl IntoIterator<Item = Migration>,
        target: &'static str,
        config: UpgradeConfig,
    ) -> UpgradeResult<Self> {
        let chain: Vec<Migration> = chain.into_iter().collect();
        validate_chain(&chain, target)?;
        Ok(Self {
            chain,
            target,
            ctx: PhaseContext::new(config),
        })
    }

    /// Target model version
    #[inline]
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Steps in chain order
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &[Migration] {
        &self.chain
    }

    /// Shared phase context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &PhaseContext {
        &self.ctx
    }

    /// Model version declared by a record set
    ///
    /// A missing root record or version attribute means
    /// [`INITIAL_MODEL_VERSION`].
    ///
    /// # Errors
    /// Returns [`UpgradeError::UnreadableVersion`] if the attribute is not a
    /// string
    pub fn current_version(records: &RecordSet) -> UpgradeResult<String> {
        match records.root().and_then(|r| r.attribute(attr::MODEL_VERSION)) {
            None | Some(Value::Null) => Ok(INITIAL_MODEL_VERSION.to_string()),
            Some(Value::String(version)) => Ok(version.clone()),
            Some(other) => Err(UpgradeError::UnreadableVersion(other.clone())),
        }
    }

    /// Upgrade records to the target version without persisting phases
    ///
    /// # Errors
    /// Returns error if the version is unknown or any phase fails
    pub fn upgrade(&self, records: impl IntoIterator<Item = Record>) -> UpgradeResult<UpgradeOutcome> {
        self.upgrade_with_sink(records, &mut DiscardSink)
    }

    /// Upgrade records to the target version, handing each committed phase
    /// to `sink`
    ///
    /// # Errors
    /// Returns error if the version is unknown, any phase fails or the sink
    /// rejects a commit. Phases already handed to the sink stay persisted.
    pub fn upgrade_with_sink<S: PhaseSink>(
        &self,
        records: impl IntoIterator<Item = Record>,
        sink: &mut S,
    ) -> UpgradeResult<UpgradeOutcome> {
        let mut records: RecordSet = records.into_iter().collect();
        if records.is_empty() {
            tracing::debug!("No configuration records; nothing to upgrade");
            return Ok(UpgradeOutcome::new(records, self.target.to_string()));
        }

        let mut version = Self::current_version(&records)?;
        if version == self.target {
            return Ok(UpgradeOutcome::new(records, version));
        }
        tracing::info!(
            "Upgrading {} configuration records from model version {} to {}",
            records.len(),
            version,
            self.target
        );

        let mut outcome = UpgradeOutcome::new(RecordSet::new(), version.clone());
        while version != self.target {
            let migration = self.select(&version)?;
            let staging = self.run_phase(migration, &records)?;
            records.apply(&staging);

            let commit = PhaseCommit::new(migration, staging);
            sink.commit(&commit).map_err(|e| UpgradeError::Sink {
                from: commit.from_version(),
                to: commit.to_version(),
                source: Box::new(e),
            })?;
            tracing::info!(
                "Committed {} ({} -> {}): {} updated, {} deleted",
                migration.name(),
                commit.from_version(),
                commit.to_version(),
                commit.updates().len(),
                commit.deletes().len()
            );
            outcome.record_commit(&commit);
            version = migration.to_version().to_string();
        }

        tracing::info!("Configuration store upgraded to model version {}", version);
        outcome.records = records;
        Ok(outcome)
    }

    fn select(&self, version: &str) -> UpgradeResult<Migration> {
        self.chain
            .iter()
            .copied()
            .find(|m| m.from_version() == version)
            .ok_or_else(|| UpgradeError::UnsupportedVersion {
                version: version.to_string(),
                target: self.target.to_string(),
            })
    }

    /// Run one step's visit and complete passes without committing
    ///
    /// # Errors
    /// Returns error if the phase rejects the records
    pub fn run_phase(&self, migration: Migration, records: &RecordSet) -> UpgradeResult<StagingSet> {
        let mut phase = migration.begin(&self.ctx);
        let mut staging = StagingSet::new();
        tracing::debug!(
            "Running {} over {} records",
            migration.name(),
            records.len()
        );
        for record in records {
            phase.visit(record, &mut staging)?;
        }
        phase.complete(&mut staging)?;
        Ok(staging)
    }
}

fn validate_chain(chain: &[Migration], target: &str) -> UpgradeResult<()> {
    let Some(last) = chain.last() else {
        return Err(UpgradeError::BrokenChain("chain is empty".to_string()));
    };

    let mut froms = HashSet::new();
    for migration in chain {
        if !froms.insert(migration.from_version()) {
            return Err(UpgradeError::BrokenChain(format!(
                "more than one step from version {}",
                migration.from_version()
            )));
        }
    }

    for pair in chain.windows(2) {
        if pair[0].to_version() != pair[1].from_version() {
            return Err(UpgradeError::BrokenChain(format!(
                "{} ends at {} but {} starts at {}",
                pair[0].name(),
                pair[0].to_version(),
                pair[1].name(),
                pair[1].from_version()
            )));
        }
    }

    if last.to_version() != target {
        return Err(UpgradeError::BrokenChain(format!(
            "chain ends at {} instead of {}",
            last.to_version(),
            target
        )));
    }
    Ok(())
}
