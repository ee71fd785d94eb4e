use chrono::{DateTime, Utc};
use langie_workflow::{RunStatus, Stage, WorkflowRecord};
use serde::{Deserialize, Serialize};

/// A persisted snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  pub run_id: String,
  /// The stage the run continues from. `None` once the run has finished.
  pub next_stage: Option<Stage>,
  pub record: WorkflowRecord,
  /// Incremented by the executor on every save.
  pub revision: i64,
  pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
  /// A first-revision checkpoint for a record.
  pub fn new(record: WorkflowRecord, next_stage: Option<Stage>) -> Self {
    Self {
      run_id: record.run_id.clone(),
      next_stage,
      record,
      revision: 1,
      updated_at: Utc::now(),
    }
  }

  /// The following revision, carrying a new record and continuation.
  pub fn advance(&self, record: WorkflowRecord, next_stage: Option<Stage>) -> Self {
    Self {
      run_id: self.run_id.clone(),
      next_stage,
      record,
      revision: self.revision + 1,
      updated_at: Utc::now(),
    }
  }

  /// Suspended at WAIT, waiting for the requester.
  pub fn is_suspended(&self) -> bool {
    self.next_stage == Some(Stage::Wait) && self.record.run_status == RunStatus::AwaitingInput
  }

  pub fn summary(&self) -> CheckpointSummary {
    CheckpointSummary {
      run_id: self.run_id.clone(),
      run_status: self.record.run_status,
      next_stage: self.next_stage,
      revision: self.revision,
      updated_at: self.updated_at,
    }
  }
}

/// Listing entry for a stored run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
  pub run_id: String,
  pub run_status: RunStatus,
  pub next_stage: Option<Stage>,
  pub revision: i64,
  pub updated_at: DateTime<Utc>,
}
