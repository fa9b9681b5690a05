// crates/saga-run-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Run Store
// Description: Durable RunStore and ArtifactLedger backed by SQLite WAL.
// Purpose: Persist saga runs, steps, actors, messages, evidence, coverage.
// Dependencies: saga-run-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the engine's storage seams over one `SQLite`
//! database. Run, step, actor, and message rows are stored in normalized
//! tables; coverage snapshots are stored as canonical JSON with integrity
//! hashes and fail closed on corruption, alongside normalized item rows and
//! tag bindings for direct querying. Attempt counters are incremented
//! in-database so concurrent step updates never lose increments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use saga_run_core::ActorKey;
use saga_run_core::ArtifactId;
use saga_run_core::ArtifactKind;
use saga_run_core::ArtifactLedger;
use saga_run_core::CoverageReport;
use saga_run_core::CoverageSubject;
use saga_run_core::DeliveryStatus;
use saga_run_core::ExecutionMode;
use saga_run_core::FailureCode;
use saga_run_core::HashDigest;
use saga_run_core::LedgerError;
use saga_run_core::MessageChannel;
use saga_run_core::MessageId;
use saga_run_core::NewArtifact;
use saga_run_core::RunId;
use saga_run_core::RunStatus;
use saga_run_core::RunStore;
use saga_run_core::SagaId;
use saga_run_core::SagaRun;
use saga_run_core::SagaRunActorMessage;
use saga_run_core::SagaRunActorProfile;
use saga_run_core::SagaRunArtifact;
use saga_run_core::SagaRunStep;
use saga_run_core::StepCounters;
use saga_run_core::StepKey;
use saga_run_core::StepStatus;
use saga_run_core::StoreError;
use saga_run_core::TenantId;
use saga_run_core::Timestamp;
use saga_run_core::core::hashing::DEFAULT_HASH_ALGORITHM;
use saga_run_core::core::hashing::HashAlgorithm;
use saga_run_core::core::hashing::hash_bytes;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` run store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Unique-key violation on insert.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Invalid(format!("schema version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

impl From<SqliteStoreError> for LedgerError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Ledger(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed run store and artifact ledger with WAL support.
#[derive(Clone)]
pub struct SqliteRunStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Next artifact sequence number, seeded from the ledger table at open.
    next_artifact_id: Arc<AtomicU64>,
}

impl SqliteRunStore {
    /// Opens a `SQLite`-backed run store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        let max_artifact_id: i64 = connection
            .query_row("SELECT COALESCE(MAX(id), 0) FROM saga_run_artifact", params![], |row| {
                row.get(0)
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_artifact_id = u64::try_from(max_artifact_id)
            .map_err(|_| SqliteStoreError::Corrupt("negative artifact id".to_string()))?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            next_artifact_id: Arc::new(AtomicU64::new(next_artifact_id)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Run Store Impl
// ============================================================================

impl RunStore for SqliteRunStore {
    fn insert_run(&self, run: &SagaRun) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO saga_run (run_id, saga_id, tenant_id, mode, status, counters_json, \
                 context_json, summary_json, created_at, started_at, ended_at, \
                 last_heartbeat_at, archived) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13)",
                params![
                    run.run_id.as_str(),
                    run.saga_id.as_str(),
                    tenant_column(run.tenant_id)?,
                    mode_label(run.mode),
                    run.status.as_str(),
                    counters_json(&run.counters)?,
                    optional_json(run.context.as_ref())?,
                    summary_json(run.summary.as_ref())?,
                    run.created_at.as_unix_millis(),
                    run.started_at.map(Timestamp::as_unix_millis),
                    run.ended_at.map(Timestamp::as_unix_millis),
                    run.last_heartbeat_at.map(Timestamp::as_unix_millis),
                    i64::from(run.archived),
                ],
            )
            .map_err(|err| map_write_error(&err, &format!("run {}", run.run_id)))?;
        Ok(())
    }

    fn load_run(&self, run_id: &RunId) -> Result<Option<SagaRun>, StoreError> {
        let guard = self.lock()?;
        let row: Option<RunRow> = guard
            .query_row(
                "SELECT run_id, saga_id, tenant_id, mode, status, counters_json, context_json, \
                 summary_json, created_at, started_at, ended_at, last_heartbeat_at, archived \
                 FROM saga_run WHERE run_id = ?1",
                params![run_id.as_str()],
                read_run_row,
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        drop(guard);
        row.map(RunRow::into_run).transpose().map_err(StoreError::from)
    }

    fn save_run(&self, run: &SagaRun) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE saga_run SET status = ?2, counters_json = ?3, context_json = ?4, \
                 summary_json = ?5, started_at = ?6, ended_at = ?7, last_heartbeat_at = ?8, \
                 archived = ?9 WHERE run_id = ?1",
                params![
                    run.run_id.as_str(),
                    run.status.as_str(),
                    counters_json(&run.counters)?,
                    optional_json(run.context.as_ref())?,
                    summary_json(run.summary.as_ref())?,
                    run.started_at.map(Timestamp::as_unix_millis),
                    run.ended_at.map(Timestamp::as_unix_millis),
                    run.last_heartbeat_at.map(Timestamp::as_unix_millis),
                    i64::from(run.archived),
                ],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        if updated == 0 {
            return Err(SqliteStoreError::Invalid(format!("run {} not found", run.run_id)).into());
        }
        Ok(())
    }

    fn insert_step(&self, step: &SagaRunStep) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO saga_run_step (run_id, step_key, phase_order, step_order, \
                 actor_key, status, attempts, failure_code, failure_message, result_json, \
                 assertions_json, started_at, ended_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, \
                 ?9, ?10, ?11, ?12, ?13)",
                params![
                    step.run_id.as_str(),
                    step.step_key.as_str(),
                    i64::from(step.phase_order),
                    i64::from(step.step_order),
                    step.actor_key.as_str(),
                    step.status.as_str(),
                    i64::from(step.attempts),
                    step.failure_code.as_ref().map(FailureCode::as_str),
                    step.failure_message.as_deref(),
                    optional_json(step.result.as_ref())?,
                    optional_json(step.assertions.as_ref())?,
                    step.started_at.map(Timestamp::as_unix_millis),
                    step.ended_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(|err| {
                map_write_error(&err, &format!("step {}/{}", step.run_id, step.step_key))
            })?;
        Ok(())
    }

    fn load_step(
        &self,
        run_id: &RunId,
        step_key: &StepKey,
    ) -> Result<Option<SagaRunStep>, StoreError> {
        let guard = self.lock()?;
        let row: Option<StepRow> = guard
            .query_row(
                "SELECT run_id, step_key, phase_order, step_order, actor_key, status, attempts, \
                 failure_code, failure_message, result_json, assertions_json, started_at, \
                 ended_at FROM saga_run_step WHERE run_id = ?1 AND step_key = ?2",
                params![run_id.as_str(), step_key.as_str()],
                read_step_row,
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        drop(guard);
        row.map(StepRow::into_step).transpose().map_err(StoreError::from)
    }

    fn save_step(&self, step: &SagaRunStep) -> Result<(), StoreError> {
        // Attempts are owned by increment_attempts and deliberately excluded.
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE saga_run_step SET status = ?3, failure_code = ?4, failure_message = ?5, \
                 result_json = ?6, assertions_json = ?7, started_at = ?8, ended_at = ?9 WHERE \
                 run_id = ?1 AND step_key = ?2",
                params![
                    step.run_id.as_str(),
                    step.step_key.as_str(),
                    step.status.as_str(),
                    step.failure_code.as_ref().map(FailureCode::as_str),
                    step.failure_message.as_deref(),
                    optional_json(step.result.as_ref())?,
                    optional_json(step.assertions.as_ref())?,
                    step.started_at.map(Timestamp::as_unix_millis),
                    step.ended_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        if updated == 0 {
            return Err(SqliteStoreError::Invalid(format!(
                "step {}/{} not found",
                step.run_id, step.step_key
            ))
            .into());
        }
        Ok(())
    }

    fn list_steps(&self, run_id: &RunId) -> Result<Vec<SagaRunStep>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT run_id, step_key, phase_order, step_order, actor_key, status, attempts, \
                 failure_code, failure_message, result_json, assertions_json, started_at, \
                 ended_at FROM saga_run_step WHERE run_id = ?1 ORDER BY phase_order, step_order",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let rows = statement
            .query_map(params![run_id.as_str()], read_step_row)
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let mut steps = Vec::new();
        for row in rows {
            let row = row.map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
            steps.push(row.into_step().map_err(StoreError::from)?);
        }
        Ok(steps)
    }

    fn increment_attempts(&self, run_id: &RunId, step_key: &StepKey) -> Result<(), StoreError> {
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE saga_run_step SET attempts = attempts + 1 WHERE run_id = ?1 AND step_key \
                 = ?2",
                params![run_id.as_str(), step_key.as_str()],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        if updated == 0 {
            return Err(
                SqliteStoreError::Invalid(format!("step {run_id}/{step_key} not found")).into()
            );
        }
        Ok(())
    }

    fn insert_profile(&self, profile: &SagaRunActorProfile) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO saga_run_actor_profile (run_id, actor_key, display_name, role, \
                 virtual_email, virtual_phone, real_identity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, \
                 ?7)",
                params![
                    profile.run_id.as_str(),
                    profile.actor_key.as_str(),
                    profile.display_name,
                    profile.role,
                    profile.virtual_email,
                    profile.virtual_phone,
                    profile.real_identity.as_deref(),
                ],
            )
            .map_err(|err| {
                map_write_error(
                    &err,
                    &format!("actor profile {}/{}", profile.run_id, profile.actor_key),
                )
            })?;
        Ok(())
    }

    fn load_profile(
        &self,
        run_id: &RunId,
        actor_key: &ActorKey,
    ) -> Result<Option<SagaRunActorProfile>, StoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT run_id, actor_key, display_name, role, virtual_email, virtual_phone, \
                 real_identity FROM saga_run_actor_profile WHERE run_id = ?1 AND actor_key = ?2",
                params![run_id.as_str(), actor_key.as_str()],
                read_profile_row,
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))
    }

    fn list_profiles(&self, run_id: &RunId) -> Result<Vec<SagaRunActorProfile>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT run_id, actor_key, display_name, role, virtual_email, virtual_phone, \
                 real_identity FROM saga_run_actor_profile WHERE run_id = ?1 ORDER BY actor_key",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let rows = statement
            .query_map(params![run_id.as_str()], read_profile_row)
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles
                .push(row.map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?);
        }
        Ok(profiles)
    }

    fn insert_message(&self, message: &SagaRunActorMessage) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO saga_run_actor_message (message_id, run_id, channel, status, \
                 sender, recipient, subject, body, queued_at, sent_at, delivered_at, read_at, \
                 failed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    message.message_id.as_str(),
                    message.run_id.as_str(),
                    channel_label(message.channel),
                    delivery_label(message.status),
                    message.sender.as_ref().map(ActorKey::as_str),
                    message.recipient.as_str(),
                    message.subject.as_deref(),
                    message.body,
                    message.queued_at.as_unix_millis(),
                    message.sent_at.map(Timestamp::as_unix_millis),
                    message.delivered_at.map(Timestamp::as_unix_millis),
                    message.read_at.map(Timestamp::as_unix_millis),
                    message.failed_at.map(Timestamp::as_unix_millis),
                ],
            )
            .map_err(|err| map_write_error(&err, &format!("message {}", message.message_id)))?;
        Ok(())
    }

    fn list_messages(&self, run_id: &RunId) -> Result<Vec<SagaRunActorMessage>, StoreError> {
        let guard = self.lock()?;
        let mut statement = guard
            .prepare(
                "SELECT message_id, run_id, channel, status, sender, recipient, subject, body, \
                 queued_at, sent_at, delivered_at, read_at, failed_at FROM \
                 saga_run_actor_message WHERE run_id = ?1 ORDER BY rowid",
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let rows = statement
            .query_map(params![run_id.as_str()], read_message_row)
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        let mut messages = Vec::new();
        for row in rows {
            let row = row.map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
            messages.push(row.into_message().map_err(StoreError::from)?);
        }
        Ok(messages)
    }

    fn replace_coverage(&self, report: &CoverageReport) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(report)
            .map_err(|err| StoreError::from(SqliteStoreError::Invalid(err.to_string())))?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes);
        let mut guard = self.lock()?;
        let tx = guard
            .transaction()
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        tx.execute(
            "INSERT INTO coverage_report (run_id, report_json, report_hash, hash_algorithm, \
             generated_at) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(run_id) DO UPDATE SET \
             report_json = excluded.report_json, report_hash = excluded.report_hash, \
             hash_algorithm = excluded.hash_algorithm, generated_at = excluded.generated_at",
            params![
                report.run_id.as_str(),
                bytes,
                digest.value,
                hash_algorithm_label(digest.algorithm),
                report.generated_at.as_unix_millis(),
            ],
        )
        .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        tx.execute(
            "DELETE FROM coverage_item WHERE run_id = ?1",
            params![report.run_id.as_str()],
        )
        .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        tx.execute(
            "DELETE FROM coverage_tag_binding WHERE run_id = ?1",
            params![report.run_id.as_str()],
        )
        .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        for tag in report.tag_values() {
            tx.execute("INSERT OR IGNORE INTO coverage_tag (value) VALUES (?1)", params![tag])
                .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        }
        // A NULL item_ordinal binds the tag to the report row itself.
        for tag in distinct_tags([
            report.classification.as_str(),
            report.verdict.as_str(),
            report.workaround.as_str(),
            report.locus.as_str(),
        ]) {
            tx.execute(
                "INSERT INTO coverage_tag_binding (run_id, item_ordinal, tag_value) VALUES \
                 (?1, ?2, ?3)",
                params![report.run_id.as_str(), Option::<i64>::None, tag],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        }
        for (index, item) in report.items.iter().enumerate() {
            let ordinal = i64::try_from(index).map_err(|_| {
                StoreError::from(SqliteStoreError::Invalid(
                    "coverage item ordinal overflow".to_string(),
                ))
            })?;
            let (subject_kind, subject_key) = subject_labels(&item.subject);
            tx.execute(
                "INSERT INTO coverage_item (run_id, ordinal, subject_kind, subject_key, \
                 classification, verdict, workaround, locus, note) VALUES (?1, ?2, ?3, ?4, ?5, \
                 ?6, ?7, ?8, ?9)",
                params![
                    report.run_id.as_str(),
                    ordinal,
                    subject_kind,
                    subject_key,
                    item.classification.as_str(),
                    item.verdict.as_str(),
                    item.workaround.as_str(),
                    item.locus.as_str(),
                    item.note,
                ],
            )
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
            for tag in distinct_tags([
                item.classification.as_str(),
                item.verdict.as_str(),
                item.workaround.as_str(),
                item.locus.as_str(),
            ]) {
                tx.execute(
                    "INSERT INTO coverage_tag_binding (run_id, item_ordinal, tag_value) VALUES \
                     (?1, ?2, ?3)",
                    params![report.run_id.as_str(), ordinal, tag],
                )
                .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
            }
        }
        tx.commit().map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        drop(guard);
        Ok(())
    }

    fn load_coverage(&self, run_id: &RunId) -> Result<Option<CoverageReport>, StoreError> {
        let guard = self.lock()?;
        let row: Option<(Vec<u8>, String, String)> = guard
            .query_row(
                "SELECT report_json, report_hash, hash_algorithm FROM coverage_report WHERE \
                 run_id = ?1",
                params![run_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        drop(guard);
        let Some((bytes, hash_value, algorithm_label)) = row else {
            return Ok(None);
        };
        let algorithm = parse_hash_algorithm(&algorithm_label).map_err(StoreError::from)?;
        let HashDigest { value, .. } = hash_bytes(algorithm, &bytes);
        if value != hash_value {
            return Err(SqliteStoreError::Corrupt(format!(
                "coverage report hash mismatch for run {run_id}"
            ))
            .into());
        }
        let report: CoverageReport = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::from(SqliteStoreError::Invalid(err.to_string())))?;
        if report.run_id != *run_id {
            return Err(SqliteStoreError::Invalid(
                "run_id mismatch between key and coverage payload".to_string(),
            )
            .into());
        }
        Ok(Some(report))
    }

    fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .query_row("SELECT 1", params![], |_| Ok(()))
            .map_err(|err| StoreError::from(SqliteStoreError::Db(err.to_string())))
    }
}

// ============================================================================
// SECTION: Artifact Ledger Impl
// ============================================================================

impl ArtifactLedger for SqliteRunStore {
    fn append(
        &self,
        artifact: NewArtifact,
        captured_at: Timestamp,
    ) -> Result<SagaRunArtifact, LedgerError> {
        let seq = self.next_artifact_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = artifact.into_record(ArtifactId::new(format!("artifact-{seq}")), captured_at)?;
        let seq_column = i64::try_from(seq)
            .map_err(|_| LedgerError::Ledger("artifact sequence overflow".to_string()))?;
        let byte_size = i64::try_from(record.byte_size)
            .map_err(|_| LedgerError::Ledger("artifact too large".to_string()))?;
        let guard = self.lock().map_err(LedgerError::from)?;
        guard
            .execute(
                "INSERT INTO saga_run_artifact (id, artifact_id, run_id, step_key, kind, title, \
                 locator, content_type, byte_size, checksum_algorithm, checksum_value, \
                 captured_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    seq_column,
                    record.artifact_id.as_str(),
                    record.run_id.as_str(),
                    record.step_key.as_ref().map(StepKey::as_str),
                    record.kind.as_str(),
                    record.title,
                    record.locator,
                    record.content_type,
                    byte_size,
                    hash_algorithm_label(record.checksum.algorithm),
                    record.checksum.value,
                    record.captured_at.as_unix_millis(),
                ],
            )
            .map_err(|err| LedgerError::Ledger(err.to_string()))?;
        Ok(record)
    }

    fn count_by_kind(
        &self,
        run_id: &RunId,
        step_key: Option<&StepKey>,
        kind: ArtifactKind,
    ) -> Result<u64, LedgerError> {
        let guard = self.lock().map_err(LedgerError::from)?;
        let count: i64 = match step_key {
            Some(step_key) => guard
                .query_row(
                    "SELECT COUNT(*) FROM saga_run_artifact WHERE run_id = ?1 AND step_key = ?2 \
                     AND kind = ?3",
                    params![run_id.as_str(), step_key.as_str(), kind.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| LedgerError::Ledger(err.to_string()))?,
            None => guard
                .query_row(
                    "SELECT COUNT(*) FROM saga_run_artifact WHERE run_id = ?1 AND step_key IS \
                     NULL AND kind = ?2",
                    params![run_id.as_str(), kind.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| LedgerError::Ledger(err.to_string()))?,
        };
        u64::try_from(count).map_err(|_| LedgerError::Ledger("negative artifact count".to_string()))
    }

    fn list_by_run(&self, run_id: &RunId) -> Result<Vec<SagaRunArtifact>, LedgerError> {
        let guard = self.lock().map_err(LedgerError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT artifact_id, run_id, step_key, kind, title, locator, content_type, \
                 byte_size, checksum_algorithm, checksum_value, captured_at FROM \
                 saga_run_artifact WHERE run_id = ?1 ORDER BY id",
            )
            .map_err(|err| LedgerError::Ledger(err.to_string()))?;
        let rows = statement
            .query_map(params![run_id.as_str()], read_artifact_row)
            .map_err(|err| LedgerError::Ledger(err.to_string()))?;
        let mut artifacts = Vec::new();
        for row in rows {
            let row = row.map_err(|err| LedgerError::Ledger(err.to_string()))?;
            artifacts.push(row.into_artifact().map_err(LedgerError::from)?);
        }
        Ok(artifacts)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw run row as read from `SQLite`, before domain conversion.
struct RunRow {
    /// `run_id` column.
    run_id: String,
    /// `saga_id` column.
    saga_id: String,
    /// `tenant_id` column.
    tenant_id: Option<i64>,
    /// `mode` column.
    mode: String,
    /// `status` column.
    status: String,
    /// `counters_json` column.
    counters_json: String,
    /// `context_json` column.
    context_json: Option<String>,
    /// `summary_json` column.
    summary_json: Option<String>,
    /// `created_at` column.
    created_at: i64,
    /// `started_at` column.
    started_at: Option<i64>,
    /// `ended_at` column.
    ended_at: Option<i64>,
    /// `last_heartbeat_at` column.
    last_heartbeat_at: Option<i64>,
    /// `archived` column.
    archived: i64,
}

impl RunRow {
    /// Converts the raw row into a domain run, failing closed on bad data.
    fn into_run(self) -> Result<SagaRun, SqliteStoreError> {
        let counters: StepCounters = serde_json::from_str(&self.counters_json)
            .map_err(|err| SqliteStoreError::Corrupt(format!("counters_json: {err}")))?;
        let context = self
            .context_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| SqliteStoreError::Corrupt(format!("context_json: {err}")))?;
        let summary = self
            .summary_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| SqliteStoreError::Corrupt(format!("summary_json: {err}")))?;
        Ok(SagaRun {
            run_id: RunId::new(self.run_id),
            saga_id: SagaId::new(self.saga_id),
            tenant_id: self.tenant_id.map(parse_tenant).transpose()?,
            mode: parse_mode(&self.mode)?,
            status: parse_run_status(&self.status)?,
            counters,
            context,
            summary,
            created_at: Timestamp::from_unix_millis(self.created_at),
            started_at: self.started_at.map(Timestamp::from_unix_millis),
            ended_at: self.ended_at.map(Timestamp::from_unix_millis),
            last_heartbeat_at: self.last_heartbeat_at.map(Timestamp::from_unix_millis),
            archived: self.archived != 0,
        })
    }
}

/// Reads one run row.
fn read_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        run_id: row.get(0)?,
        saga_id: row.get(1)?,
        tenant_id: row.get(2)?,
        mode: row.get(3)?,
        status: row.get(4)?,
        counters_json: row.get(5)?,
        context_json: row.get(6)?,
        summary_json: row.get(7)?,
        created_at: row.get(8)?,
        started_at: row.get(9)?,
        ended_at: row.get(10)?,
        last_heartbeat_at: row.get(11)?,
        archived: row.get(12)?,
    })
}

/// Raw step row as read from `SQLite`, before domain conversion.
struct StepRow {
    /// `run_id` column.
    run_id: String,
    /// `step_key` column.
    step_key: String,
    /// `phase_order` column.
    phase_order: i64,
    /// `step_order` column.
    step_order: i64,
    /// `actor_key` column.
    actor_key: String,
    /// `status` column.
    status: String,
    /// `attempts` column.
    attempts: i64,
    /// `failure_code` column.
    failure_code: Option<String>,
    /// `failure_message` column.
    failure_message: Option<String>,
    /// `result_json` column.
    result_json: Option<String>,
    /// `assertions_json` column.
    assertions_json: Option<String>,
    /// `started_at` column.
    started_at: Option<i64>,
    /// `ended_at` column.
    ended_at: Option<i64>,
}

impl StepRow {
    /// Converts the raw row into a domain step, failing closed on bad data.
    fn into_step(self) -> Result<SagaRunStep, SqliteStoreError> {
        let result = self
            .result_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| SqliteStoreError::Corrupt(format!("result_json: {err}")))?;
        let assertions = self
            .assertions_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| SqliteStoreError::Corrupt(format!("assertions_json: {err}")))?;
        Ok(SagaRunStep {
            run_id: RunId::new(self.run_id),
            step_key: StepKey::new(self.step_key),
            phase_order: parse_order(self.phase_order, "phase_order")?,
            step_order: parse_order(self.step_order, "step_order")?,
            actor_key: ActorKey::new(self.actor_key),
            status: parse_step_status(&self.status)?,
            attempts: parse_order(self.attempts, "attempts")?,
            failure_code: self.failure_code.map(FailureCode::new),
            failure_message: self.failure_message,
            result,
            assertions,
            started_at: self.started_at.map(Timestamp::from_unix_millis),
            ended_at: self.ended_at.map(Timestamp::from_unix_millis),
        })
    }
}

/// Reads one step row.
fn read_step_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StepRow> {
    Ok(StepRow {
        run_id: row.get(0)?,
        step_key: row.get(1)?,
        phase_order: row.get(2)?,
        step_order: row.get(3)?,
        actor_key: row.get(4)?,
        status: row.get(5)?,
        attempts: row.get(6)?,
        failure_code: row.get(7)?,
        failure_message: row.get(8)?,
        result_json: row.get(9)?,
        assertions_json: row.get(10)?,
        started_at: row.get(11)?,
        ended_at: row.get(12)?,
    })
}

/// Reads one actor profile row directly into its domain type.
fn read_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SagaRunActorProfile> {
    let run_id: String = row.get(0)?;
    let actor_key: String = row.get(1)?;
    Ok(SagaRunActorProfile {
        run_id: RunId::new(run_id),
        actor_key: ActorKey::new(actor_key),
        display_name: row.get(2)?,
        role: row.get(3)?,
        virtual_email: row.get(4)?,
        virtual_phone: row.get(5)?,
        real_identity: row.get(6)?,
    })
}

/// Raw message row as read from `SQLite`, before domain conversion.
struct MessageRow {
    /// `message_id` column.
    message_id: String,
    /// `run_id` column.
    run_id: String,
    /// `channel` column.
    channel: String,
    /// `status` column.
    status: String,
    /// `sender` column.
    sender: Option<String>,
    /// `recipient` column.
    recipient: String,
    /// `subject` column.
    subject: Option<String>,
    /// `body` column.
    body: String,
    /// `queued_at` column.
    queued_at: i64,
    /// `sent_at` column.
    sent_at: Option<i64>,
    /// `delivered_at` column.
    delivered_at: Option<i64>,
    /// `read_at` column.
    read_at: Option<i64>,
    /// `failed_at` column.
    failed_at: Option<i64>,
}

impl MessageRow {
    /// Converts the raw row into a domain message, failing closed on bad data.
    fn into_message(self) -> Result<SagaRunActorMessage, SqliteStoreError> {
        Ok(SagaRunActorMessage {
            message_id: MessageId::new(self.message_id),
            run_id: RunId::new(self.run_id),
            channel: parse_channel(&self.channel)?,
            status: parse_delivery(&self.status)?,
            sender: self.sender.map(ActorKey::new),
            recipient: ActorKey::new(self.recipient),
            subject: self.subject,
            body: self.body,
            queued_at: Timestamp::from_unix_millis(self.queued_at),
            sent_at: self.sent_at.map(Timestamp::from_unix_millis),
            delivered_at: self.delivered_at.map(Timestamp::from_unix_millis),
            read_at: self.read_at.map(Timestamp::from_unix_millis),
            failed_at: self.failed_at.map(Timestamp::from_unix_millis),
        })
    }
}

/// Reads one message row.
fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        message_id: row.get(0)?,
        run_id: row.get(1)?,
        channel: row.get(2)?,
        status: row.get(3)?,
        sender: row.get(4)?,
        recipient: row.get(5)?,
        subject: row.get(6)?,
        body: row.get(7)?,
        queued_at: row.get(8)?,
        sent_at: row.get(9)?,
        delivered_at: row.get(10)?,
        read_at: row.get(11)?,
        failed_at: row.get(12)?,
    })
}

/// Raw artifact row as read from `SQLite`, before domain conversion.
struct ArtifactRow {
    /// `artifact_id` column.
    artifact_id: String,
    /// `run_id` column.
    run_id: String,
    /// `step_key` column.
    step_key: Option<String>,
    /// `kind` column.
    kind: String,
    /// `title` column.
    title: String,
    /// `locator` column.
    locator: String,
    /// `content_type` column.
    content_type: String,
    /// `byte_size` column.
    byte_size: i64,
    /// `checksum_algorithm` column.
    checksum_algorithm: String,
    /// `checksum_value` column.
    checksum_value: String,
    /// `captured_at` column.
    captured_at: i64,
}

impl ArtifactRow {
    /// Converts the raw row into a domain artifact, failing closed on bad data.
    fn into_artifact(self) -> Result<SagaRunArtifact, SqliteStoreError> {
        let byte_size = u64::try_from(self.byte_size)
            .map_err(|_| SqliteStoreError::Corrupt("negative artifact byte size".to_string()))?;
        Ok(SagaRunArtifact {
            artifact_id: ArtifactId::new(self.artifact_id),
            run_id: RunId::new(self.run_id),
            step_key: self.step_key.map(StepKey::new),
            kind: parse_artifact_kind(&self.kind)?,
            title: self.title,
            locator: self.locator,
            content_type: self.content_type,
            byte_size,
            checksum: HashDigest {
                algorithm: parse_hash_algorithm(&self.checksum_algorithm)?,
                value: self.checksum_value,
            },
            captured_at: Timestamp::from_unix_millis(self.captured_at),
        })
    }
}

/// Reads one artifact row.
fn read_artifact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtifactRow> {
    Ok(ArtifactRow {
        artifact_id: row.get(0)?,
        run_id: row.get(1)?,
        step_key: row.get(2)?,
        kind: row.get(3)?,
        title: row.get(4)?,
        locator: row.get(5)?,
        content_type: row.get(6)?,
        byte_size: row.get(7)?,
        checksum_algorithm: row.get(8)?,
        checksum_value: row.get(9)?,
        captured_at: row.get(10)?,
    })
}

// ============================================================================
// SECTION: Label Helpers
// ============================================================================

/// Converts a tenant id to its storage column value.
fn tenant_column(tenant_id: Option<TenantId>) -> Result<Option<i64>, SqliteStoreError> {
    tenant_id
        .map(|tenant| {
            i64::try_from(tenant.get())
                .map_err(|_| SqliteStoreError::Invalid("tenant id too large".to_string()))
        })
        .transpose()
}

/// Parses a tenant id column value.
fn parse_tenant(raw: i64) -> Result<TenantId, SqliteStoreError> {
    let raw = u64::try_from(raw)
        .map_err(|_| SqliteStoreError::Corrupt("negative tenant id".to_string()))?;
    TenantId::from_raw(raw).ok_or_else(|| SqliteStoreError::Corrupt("zero tenant id".to_string()))
}

/// Splits a coverage subject into its storage kind label and optional key.
fn subject_labels(subject: &CoverageSubject) -> (&'static str, Option<&str>) {
    match subject {
        CoverageSubject::Run => ("run", None),
        CoverageSubject::Step {
            step_key,
        } => ("step", Some(step_key.as_str())),
        CoverageSubject::Requirement {
            requirement_id,
        } => ("requirement", Some(requirement_id.as_str())),
    }
}

/// Dedupes a subject's four axis tags, preserving first-seen order.
fn distinct_tags(tags: [&'static str; 4]) -> Vec<&'static str> {
    let mut distinct = Vec::with_capacity(tags.len());
    for tag in tags {
        if !distinct.contains(&tag) {
            distinct.push(tag);
        }
    }
    distinct
}

/// Returns the stable execution-mode column label.
const fn mode_label(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::DryRun => "dry_run",
        ExecutionMode::Live => "live",
    }
}

/// Parses an execution-mode column label.
fn parse_mode(label: &str) -> Result<ExecutionMode, SqliteStoreError> {
    match label {
        "dry_run" => Ok(ExecutionMode::DryRun),
        "live" => Ok(ExecutionMode::Live),
        other => Err(SqliteStoreError::Corrupt(format!("unknown execution mode: {other}"))),
    }
}

/// Parses a run status column label.
fn parse_run_status(label: &str) -> Result<RunStatus, SqliteStoreError> {
    match label {
        "pending" => Ok(RunStatus::Pending),
        "running" => Ok(RunStatus::Running),
        "passed" => Ok(RunStatus::Passed),
        "failed" => Ok(RunStatus::Failed),
        "cancelled" => Ok(RunStatus::Cancelled),
        other => Err(SqliteStoreError::Corrupt(format!("unknown run status: {other}"))),
    }
}

/// Parses a step status column label.
fn parse_step_status(label: &str) -> Result<StepStatus, SqliteStoreError> {
    match label {
        "pending" => Ok(StepStatus::Pending),
        "in_progress" => Ok(StepStatus::InProgress),
        "passed" => Ok(StepStatus::Passed),
        "failed" => Ok(StepStatus::Failed),
        "skipped" => Ok(StepStatus::Skipped),
        "blocked" => Ok(StepStatus::Blocked),
        other => Err(SqliteStoreError::Corrupt(format!("unknown step status: {other}"))),
    }
}

/// Parses an artifact kind column label.
fn parse_artifact_kind(label: &str) -> Result<ArtifactKind, SqliteStoreError> {
    match label {
        "report" => Ok(ArtifactKind::Report),
        "snapshot" => Ok(ArtifactKind::Snapshot),
        "api_trace" => Ok(ArtifactKind::ApiTrace),
        "step_log" => Ok(ArtifactKind::StepLog),
        "attachment" => Ok(ArtifactKind::Attachment),
        other => Err(SqliteStoreError::Corrupt(format!("unknown artifact kind: {other}"))),
    }
}

/// Returns the stable message-channel column label.
const fn channel_label(channel: MessageChannel) -> &'static str {
    match channel {
        MessageChannel::Email => "email",
        MessageChannel::Sms => "sms",
        MessageChannel::InApp => "in_app",
    }
}

/// Parses a message-channel column label.
fn parse_channel(label: &str) -> Result<MessageChannel, SqliteStoreError> {
    match label {
        "email" => Ok(MessageChannel::Email),
        "sms" => Ok(MessageChannel::Sms),
        "in_app" => Ok(MessageChannel::InApp),
        other => Err(SqliteStoreError::Corrupt(format!("unknown message channel: {other}"))),
    }
}

/// Returns the stable delivery-status column label.
const fn delivery_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Queued => "queued",
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Read => "read",
        DeliveryStatus::Failed => "failed",
    }
}

/// Parses a delivery-status column label.
fn parse_delivery(label: &str) -> Result<DeliveryStatus, SqliteStoreError> {
    match label {
        "queued" => Ok(DeliveryStatus::Queued),
        "sent" => Ok(DeliveryStatus::Sent),
        "delivered" => Ok(DeliveryStatus::Delivered),
        "read" => Ok(DeliveryStatus::Read),
        "failed" => Ok(DeliveryStatus::Failed),
        other => Err(SqliteStoreError::Corrupt(format!("unknown delivery status: {other}"))),
    }
}

/// Returns the canonical hash algorithm label.
const fn hash_algorithm_label(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha256 => "sha256",
    }
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(SqliteStoreError::Invalid(format!("unsupported hash algorithm: {other}"))),
    }
}

/// Parses a non-negative counter column into a `u32`.
fn parse_order(value: i64, column: &str) -> Result<u32, SqliteStoreError> {
    u32::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("{column} out of range: {value}")))
}

// ============================================================================
// SECTION: JSON Helpers
// ============================================================================

/// Serializes step counters to their JSON column form.
fn counters_json(counters: &StepCounters) -> Result<String, SqliteStoreError> {
    serde_json::to_string(counters).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Serializes an optional JSON payload to its column form.
fn optional_json(value: Option<&serde_json::Value>) -> Result<Option<String>, SqliteStoreError> {
    value
        .map(|value| {
            serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
        })
        .transpose()
}

/// Serializes an optional run summary to its column form.
fn summary_json(
    summary: Option<&saga_run_core::RunSummary>,
) -> Result<Option<String>, SqliteStoreError> {
    summary
        .map(|summary| {
            serde_json::to_string(summary).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
        })
        .transpose()
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Maps a write error, surfacing unique-key violations as conflicts.
fn map_write_error(error: &rusqlite::Error, context: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
    {
        return SqliteStoreError::Conflict(format!("{context} already exists")).into();
    }
    SqliteStoreError::Db(format!("{context}: {error}")).into()
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens a `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS saga_run (
                    run_id TEXT PRIMARY KEY,
                    saga_id TEXT NOT NULL,
                    tenant_id INTEGER,
                    mode TEXT NOT NULL,
                    status TEXT NOT NULL,
                    counters_json TEXT NOT NULL,
                    context_json TEXT,
                    summary_json TEXT,
                    created_at INTEGER NOT NULL,
                    started_at INTEGER,
                    ended_at INTEGER,
                    last_heartbeat_at INTEGER,
                    archived INTEGER NOT NULL DEFAULT 0
                );
                CREATE TABLE IF NOT EXISTS saga_run_step (
                    run_id TEXT NOT NULL,
                    step_key TEXT NOT NULL,
                    phase_order INTEGER NOT NULL,
                    step_order INTEGER NOT NULL,
                    actor_key TEXT NOT NULL,
                    status TEXT NOT NULL,
                    attempts INTEGER NOT NULL DEFAULT 0,
                    failure_code TEXT,
                    failure_message TEXT,
                    result_json TEXT,
                    assertions_json TEXT,
                    started_at INTEGER,
                    ended_at INTEGER,
                    PRIMARY KEY (run_id, step_key),
                    FOREIGN KEY (run_id) REFERENCES saga_run(run_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS saga_run_artifact (
                    id INTEGER PRIMARY KEY,
                    artifact_id TEXT NOT NULL UNIQUE,
                    run_id TEXT NOT NULL,
                    step_key TEXT,
                    kind TEXT NOT NULL,
                    title TEXT NOT NULL,
                    locator TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    byte_size INTEGER NOT NULL,
                    checksum_algorithm TEXT NOT NULL,
                    checksum_value TEXT NOT NULL,
                    captured_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_saga_run_artifact_scope
                    ON saga_run_artifact (run_id, step_key, kind);
                CREATE TABLE IF NOT EXISTS saga_run_actor_profile (
                    run_id TEXT NOT NULL,
                    actor_key TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    role TEXT NOT NULL,
                    virtual_email TEXT NOT NULL,
                    virtual_phone TEXT NOT NULL,
                    real_identity TEXT,
                    PRIMARY KEY (run_id, actor_key),
                    FOREIGN KEY (run_id) REFERENCES saga_run(run_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS saga_run_actor_message (
                    message_id TEXT PRIMARY KEY,
                    run_id TEXT NOT NULL,
                    channel TEXT NOT NULL,
                    status TEXT NOT NULL,
                    sender TEXT,
                    recipient TEXT NOT NULL,
                    subject TEXT,
                    body TEXT NOT NULL,
                    queued_at INTEGER NOT NULL,
                    sent_at INTEGER,
                    delivered_at INTEGER,
                    read_at INTEGER,
                    failed_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_saga_run_actor_message_run
                    ON saga_run_actor_message (run_id);
                CREATE TABLE IF NOT EXISTS coverage_report (
                    run_id TEXT PRIMARY KEY,
                    report_json BLOB NOT NULL,
                    report_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    generated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS coverage_item (
                    run_id TEXT NOT NULL,
                    ordinal INTEGER NOT NULL,
                    subject_kind TEXT NOT NULL,
                    subject_key TEXT,
                    classification TEXT NOT NULL,
                    verdict TEXT NOT NULL,
                    workaround TEXT NOT NULL,
                    locus TEXT NOT NULL,
                    note TEXT NOT NULL,
                    PRIMARY KEY (run_id, ordinal),
                    FOREIGN KEY (run_id) REFERENCES coverage_report(run_id) ON DELETE CASCADE
                );
                CREATE TABLE IF NOT EXISTS coverage_tag (
                    value TEXT PRIMARY KEY
                );
                CREATE TABLE IF NOT EXISTS coverage_tag_binding (
                    run_id TEXT NOT NULL,
                    item_ordinal INTEGER,
                    tag_value TEXT NOT NULL,
                    FOREIGN KEY (tag_value) REFERENCES coverage_tag(value)
                );
                CREATE INDEX IF NOT EXISTS idx_coverage_tag_binding_run
                    ON coverage_tag_binding (run_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
