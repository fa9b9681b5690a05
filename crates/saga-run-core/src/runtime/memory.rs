// crates/saga-run-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Backends
// Description: Mutex-guarded map implementations of the storage seams.
// Purpose: Default backends for tests and embedded single-process use.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! In-memory implementations of [`RunStore`] and [`ArtifactLedger`] backed by
//! mutex-guarded `BTreeMap`s. These carry the same contracts as the durable
//! store (conflict on duplicate insert, atomic attempt increments, coverage
//! replace-on-write) so engine behavior is identical across backends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::core::ActorKey;
use crate::core::ArtifactId;
use crate::core::ArtifactKind;
use crate::core::CoverageReport;
use crate::core::RunId;
use crate::core::SagaId;
use crate::core::SagaRun;
use crate::core::SagaRunActorMessage;
use crate::core::SagaRunActorProfile;
use crate::core::SagaRunArtifact;
use crate::core::SagaRunStep;
use crate::core::SagaSpec;
use crate::core::StepKey;
use crate::core::Timestamp;
use crate::interfaces::ArtifactLedger;
use crate::interfaces::LedgerError;
use crate::interfaces::NewArtifact;
use crate::interfaces::RunStore;
use crate::interfaces::SpecProvider;
use crate::interfaces::SpecProviderError;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Mutable tables behind the in-memory store's single lock.
#[derive(Debug, Default)]
struct StoreTables {
    /// Run rows keyed by run id.
    runs: BTreeMap<String, SagaRun>,
    /// Step rows keyed by `(run_id, step_key)`.
    steps: BTreeMap<(String, String), SagaRunStep>,
    /// Actor profiles keyed by `(run_id, actor_key)`.
    profiles: BTreeMap<(String, String), SagaRunActorProfile>,
    /// Messages in append order.
    messages: Vec<SagaRunActorMessage>,
    /// Latest coverage report per run.
    coverage: BTreeMap<String, CoverageReport>,
}

/// In-memory [`RunStore`] for tests and embedded single-process use.
///
/// # Invariants
/// - All tables sit behind one mutex, so every operation is atomic.
/// - Attempt increments mutate the stored row directly; `save_step` never
///   writes the attempt count.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    /// Guarded tables.
    tables: Mutex<StoreTables>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the tables, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunStore for InMemoryRunStore {
    fn insert_run(&self, run: &SagaRun) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables.runs.contains_key(run.run_id.as_str()) {
            return Err(StoreError::Conflict(format!(
                "run {} already exists",
                run.run_id
            )));
        }
        tables.runs.insert(run.run_id.as_str().to_string(), run.clone());
        Ok(())
    }

    fn load_run(&self, run_id: &RunId) -> Result<Option<SagaRun>, StoreError> {
        Ok(self.lock().runs.get(run_id.as_str()).cloned())
    }

    fn save_run(&self, run: &SagaRun) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if !tables.runs.contains_key(run.run_id.as_str()) {
            return Err(StoreError::Invalid(format!("run {} not found", run.run_id)));
        }
        tables.runs.insert(run.run_id.as_str().to_string(), run.clone());
        Ok(())
    }

    fn insert_step(&self, step: &SagaRunStep) -> Result<(), StoreError> {
        let key = (step.run_id.as_str().to_string(), step.step_key.as_str().to_string());
        let mut tables = self.lock();
        if tables.steps.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "step {}/{} already exists",
                step.run_id, step.step_key
            )));
        }
        tables.steps.insert(key, step.clone());
        Ok(())
    }

    fn load_step(
        &self,
        run_id: &RunId,
        step_key: &StepKey,
    ) -> Result<Option<SagaRunStep>, StoreError> {
        let key = (run_id.as_str().to_string(), step_key.as_str().to_string());
        Ok(self.lock().steps.get(&key).cloned())
    }

    fn save_step(&self, step: &SagaRunStep) -> Result<(), StoreError> {
        let key = (step.run_id.as_str().to_string(), step.step_key.as_str().to_string());
        let mut tables = self.lock();
        let Some(existing) = tables.steps.get_mut(&key) else {
            return Err(StoreError::Invalid(format!(
                "step {}/{} not found",
                step.run_id, step.step_key
            )));
        };
        // Attempts are owned by increment_attempts; preserve the stored count.
        let attempts = existing.attempts;
        *existing = step.clone();
        existing.attempts = attempts;
        Ok(())
    }

    fn list_steps(&self, run_id: &RunId) -> Result<Vec<SagaRunStep>, StoreError> {
        let tables = self.lock();
        let mut steps: Vec<SagaRunStep> = tables
            .steps
            .values()
            .filter(|step| step.run_id == *run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|step| (step.phase_order, step.step_order));
        Ok(steps)
    }

    fn increment_attempts(&self, run_id: &RunId, step_key: &StepKey) -> Result<(), StoreError> {
        let key = (run_id.as_str().to_string(), step_key.as_str().to_string());
        let mut tables = self.lock();
        let Some(step) = tables.steps.get_mut(&key) else {
            return Err(StoreError::Invalid(format!(
                "step {run_id}/{step_key} not found"
            )));
        };
        step.attempts = step.attempts.saturating_add(1);
        Ok(())
    }

    fn insert_profile(&self, profile: &SagaRunActorProfile) -> Result<(), StoreError> {
        let key = (
            profile.run_id.as_str().to_string(),
            profile.actor_key.as_str().to_string(),
        );
        let mut tables = self.lock();
        if tables.profiles.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "actor profile {}/{} already exists",
                profile.run_id, profile.actor_key
            )));
        }
        tables.profiles.insert(key, profile.clone());
        Ok(())
    }

    fn load_profile(
        &self,
        run_id: &RunId,
        actor_key: &ActorKey,
    ) -> Result<Option<SagaRunActorProfile>, StoreError> {
        let key = (run_id.as_str().to_string(), actor_key.as_str().to_string());
        Ok(self.lock().profiles.get(&key).cloned())
    }

    fn list_profiles(&self, run_id: &RunId) -> Result<Vec<SagaRunActorProfile>, StoreError> {
        Ok(self
            .lock()
            .profiles
            .values()
            .filter(|profile| profile.run_id == *run_id)
            .cloned()
            .collect())
    }

    fn insert_message(&self, message: &SagaRunActorMessage) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if tables
            .messages
            .iter()
            .any(|existing| existing.message_id == message.message_id)
        {
            return Err(StoreError::Conflict(format!(
                "message {} already exists",
                message.message_id
            )));
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    fn list_messages(&self, run_id: &RunId) -> Result<Vec<SagaRunActorMessage>, StoreError> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|message| message.run_id == *run_id)
            .cloned()
            .collect())
    }

    fn replace_coverage(&self, report: &CoverageReport) -> Result<(), StoreError> {
        self.lock()
            .coverage
            .insert(report.run_id.as_str().to_string(), report.clone());
        Ok(())
    }

    fn load_coverage(&self, run_id: &RunId) -> Result<Option<CoverageReport>, StoreError> {
        Ok(self.lock().coverage.get(run_id.as_str()).cloned())
    }
}

// ============================================================================
// SECTION: Spec Provider
// ============================================================================

/// In-memory [`SpecProvider`] holding registered saga specs.
///
/// # Invariants
/// - Registered specs are returned by value; callers never observe partial
///   updates.
#[derive(Debug, Default)]
pub struct InMemorySpecProvider {
    /// Registered specs keyed by saga id.
    specs: Mutex<BTreeMap<String, SagaSpec>>,
}

impl InMemorySpecProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spec, replacing any previous version for the same saga.
    pub fn register(&self, spec: SagaSpec) {
        self.specs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.saga_id.as_str().to_string(), spec);
    }
}

impl SpecProvider for InMemorySpecProvider {
    fn load(&self, saga_id: &SagaId) -> Result<SagaSpec, SpecProviderError> {
        self.specs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(saga_id.as_str())
            .cloned()
            .ok_or_else(|| SpecProviderError::SpecNotFound(saga_id.clone()))
    }
}

// ============================================================================
// SECTION: Artifact Ledger
// ============================================================================

/// In-memory append-only [`ArtifactLedger`].
///
/// # Invariants
/// - Records are never mutated or removed after append.
/// - Assigned artifact ids are unique for the ledger's lifetime.
#[derive(Debug, Default)]
pub struct InMemoryArtifactLedger {
    /// Appended records in arrival order.
    records: Mutex<Vec<SagaRunArtifact>>,
    /// Next artifact id suffix.
    next_id: AtomicU64,
}

impl InMemoryArtifactLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the records, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SagaRunArtifact>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArtifactLedger for InMemoryArtifactLedger {
    fn append(
        &self,
        artifact: NewArtifact,
        captured_at: Timestamp,
    ) -> Result<SagaRunArtifact, LedgerError> {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = artifact.into_record(ArtifactId::new(format!("artifact-{seq}")), captured_at)?;
        self.lock().push(record.clone());
        Ok(record)
    }

    fn count_by_kind(
        &self,
        run_id: &RunId,
        step_key: Option<&StepKey>,
        kind: ArtifactKind,
    ) -> Result<u64, LedgerError> {
        Ok(self
            .lock()
            .iter()
            .filter(|record| {
                record.run_id == *run_id
                    && record.kind == kind
                    && record.step_key.as_ref() == step_key
            })
            .count() as u64)
    }

    fn list_by_run(&self, run_id: &RunId) -> Result<Vec<SagaRunArtifact>, LedgerError> {
        Ok(self
            .lock()
            .iter()
            .filter(|record| record.run_id == *run_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions."
    )]

    use super::*;
    use crate::interfaces::ArtifactBody;

    fn step(run: &str, key: &str, phase: u32, order: u32) -> SagaRunStep {
        SagaRunStep {
            run_id: RunId::new(run),
            step_key: StepKey::new(key),
            phase_order: phase,
            step_order: order,
            actor_key: ActorKey::new("ops"),
            status: crate::core::StepStatus::Pending,
            attempts: 0,
            failure_code: None,
            failure_message: None,
            result: None,
            assertions: None,
            started_at: None,
            ended_at: None,
        }
    }

    #[test]
    fn duplicate_step_insert_conflicts() {
        let store = InMemoryRunStore::new();
        store.insert_step(&step("r1", "s1", 1, 1)).unwrap();
        let err = store.insert_step(&step("r1", "s1", 1, 1)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn save_step_preserves_attempts() {
        let store = InMemoryRunStore::new();
        let run_id = RunId::new("r1");
        let step_key = StepKey::new("s1");
        store.insert_step(&step("r1", "s1", 1, 1)).unwrap();
        store.increment_attempts(&run_id, &step_key).unwrap();
        store.increment_attempts(&run_id, &step_key).unwrap();

        let mut updated = step("r1", "s1", 1, 1);
        updated.status = crate::core::StepStatus::Passed;
        updated.attempts = 99;
        store.save_step(&updated).unwrap();

        let stored = store.load_step(&run_id, &step_key).unwrap().unwrap();
        assert_eq!(stored.status, crate::core::StepStatus::Passed);
        assert_eq!(stored.attempts, 2);
    }

    #[test]
    fn list_steps_returns_playback_order() {
        let store = InMemoryRunStore::new();
        store.insert_step(&step("r1", "z-late", 2, 1)).unwrap();
        store.insert_step(&step("r1", "a-early", 1, 2)).unwrap();
        store.insert_step(&step("r1", "m-first", 1, 1)).unwrap();

        let keys: Vec<String> = store
            .list_steps(&RunId::new("r1"))
            .unwrap()
            .iter()
            .map(|step| step.step_key.as_str().to_string())
            .collect();
        assert_eq!(keys, vec!["m-first", "a-early", "z-late"]);
    }

    #[test]
    fn ledger_counts_scope_to_step() {
        let ledger = InMemoryArtifactLedger::new();
        let run_id = RunId::new("r1");
        let step_key = StepKey::new("s1");
        ledger
            .append(
                NewArtifact {
                    run_id: run_id.clone(),
                    step_key: Some(step_key.clone()),
                    kind: ArtifactKind::ApiTrace,
                    title: "trace".to_string(),
                    locator: "mem://trace".to_string(),
                    content_type: "application/json".to_string(),
                    body: ArtifactBody::Json(serde_json::json!({"status": 200})),
                },
                Timestamp::from_unix_millis(1_000),
            )
            .unwrap();

        assert_eq!(
            ledger.count_by_kind(&run_id, Some(&step_key), ArtifactKind::ApiTrace).unwrap(),
            1
        );
        assert_eq!(ledger.count_by_kind(&run_id, None, ArtifactKind::ApiTrace).unwrap(), 0);
        assert_eq!(
            ledger
                .count_by_kind(&run_id, Some(&StepKey::new("s2")), ArtifactKind::ApiTrace)
                .unwrap(),
            0
        );
    }
}
