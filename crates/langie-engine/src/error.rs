use langie_ability::AbilityError;
use langie_store::StoreError;
use langie_workflow::{RunStatus, Stage, WorkflowError};
use thiserror::Error;

/// Errors that abort a `start` or `resume` call.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The intake was rejected before any stage ran.
  #[error("invalid intake: {0}")]
  Intake(#[source] WorkflowError),

  /// A checkpoint already exists for the run id.
  #[error("run '{0}' already exists")]
  RunExists(String),

  /// The run is not waiting at WAIT for a reply.
  #[error("run '{run_id}' is not awaiting input (status {status}, next stage {next_stage})")]
  NotResumable {
    run_id: String,
    status: RunStatus,
    next_stage: String,
  },

  /// An ability invocation failed inside a stage.
  #[error("stage {stage} failed in ability '{ability}': {source}")]
  Stage {
    stage: Stage,
    ability: String,
    #[source]
    source: AbilityError,
  },

  /// A stage produced an update the record refused, or the graph had no
  /// way forward.
  #[error("stage {stage} produced an invalid transition: {source}")]
  Record {
    stage: Stage,
    #[source]
    source: WorkflowError,
  },

  #[error(transparent)]
  Store(#[from] StoreError),
}

impl EngineError {
  /// The stage the run failed in, if the failure happened inside one.
  pub fn stage(&self) -> Option<Stage> {
    match self {
      EngineError::Stage { stage, .. } | EngineError::Record { stage, .. } => Some(*stage),
      _ => None,
    }
  }

  /// The ability whose invocation failed, if any.
  pub fn ability(&self) -> Option<&str> {
    match self {
      EngineError::Stage { ability, .. } => Some(ability),
      _ => None,
    }
  }
}
