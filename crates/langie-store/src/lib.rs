//! Langie Store
//!
//! This crate provides the checkpoint storage trait and its implementations.
//! A checkpoint is the last persisted snapshot of a run's workflow record,
//! plus the stage the run continues from.
//!
//! The [`CheckpointStore`] trait defines operations for:
//! - Creating, saving and loading a checkpoint by run id
//! - Merging a partial record update into a suspended checkpoint
//! - Listing and deleting stored runs
//!
//! [`MemoryStore`] keeps checkpoints for the lifetime of the process;
//! [`SqliteStore`] persists them to a SQLite database.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{Checkpoint, CheckpointSummary};

use async_trait::async_trait;
use langie_workflow::{RecordPatch, RunStatus, Stage, WorkflowError};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// No checkpoint exists for the run.
  #[error("no checkpoint for run: {0}")]
  NotFound(String),

  /// A checkpoint already exists for the run.
  #[error("checkpoint already exists for run: {0}")]
  AlreadyExists(String),

  /// The run is not suspended at WAIT, so no reply can be merged.
  #[error("run '{run_id}' is not awaiting input (status: {run_status})")]
  NotSuspended {
    run_id: String,
    run_status: RunStatus,
    next_stage: Option<Stage>,
  },

  /// The stored record refused the update.
  #[error(transparent)]
  Record(#[from] WorkflowError),

  /// A stored row could not be read back.
  #[error("corrupt checkpoint for run '{run_id}': {message}")]
  Corrupt { run_id: String, message: String },

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Schema migration failed.
  #[error("migration failed: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Keyed persistence of workflow record snapshots.
///
/// Implementations serialize concurrent writers to the same run id; distinct
/// run ids never interfere.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
  /// Insert the first checkpoint of a run. Fails with
  /// [`StoreError::AlreadyExists`] when the run id is taken, even when two
  /// callers race for it.
  async fn create(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

  /// Insert or overwrite the checkpoint for `checkpoint.run_id`.
  async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

  /// Load the checkpoint for a run.
  async fn load(&self, run_id: &str) -> Result<Checkpoint, StoreError>;

  /// Apply only the fields present in `patch` to the stored record and
  /// return the merged checkpoint. The revision and continuation pointer are
  /// left as they were.
  ///
  /// The check that the run is suspended and the write happen atomically: a
  /// run that is not suspended (or stopped being suspended while the patch
  /// was applied) yields [`StoreError::NotSuspended`].
  async fn merge_and_resume(
    &self,
    run_id: &str,
    patch: &RecordPatch,
  ) -> Result<Checkpoint, StoreError>;

  /// Remove a run's checkpoint. Returns whether one existed.
  async fn delete(&self, run_id: &str) -> Result<bool, StoreError>;

  /// Summaries of every stored run, most recently updated first.
  async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError>;
}
