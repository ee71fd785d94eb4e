use thiserror::Error;

use crate::stage::Stage;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("missing required intake field: {0}")]
  MissingField(&'static str),

  #[error(transparent)]
  InvalidIntake(#[from] langie_config::ConfigError),

  #[error("unknown stage: {0}")]
  UnknownStage(String),

  #[error("run '{run_id}' is terminal ({status}); refusing to change {field}")]
  TerminalRecord {
    run_id: String,
    status: String,
    field: &'static str,
  },

  #[error("stage {stage} branches on the route, but no route was decided")]
  MissingRoute { stage: Stage },

  #[error("no edge from {from} to {to}")]
  InvalidTransition { from: Stage, to: Stage },
}
