use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// One named step in the execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
  Intake,
  Understand,
  Prepare,
  Ask,
  Wait,
  Retrieve,
  Decide,
  EscalateUpdate,
  Generate,
  Act,
  Complete,
}

impl Stage {
  /// All stages, in declaration order.
  pub const ALL: [Stage; 11] = [
    Stage::Intake,
    Stage::Understand,
    Stage::Prepare,
    Stage::Ask,
    Stage::Wait,
    Stage::Retrieve,
    Stage::Decide,
    Stage::EscalateUpdate,
    Stage::Generate,
    Stage::Act,
    Stage::Complete,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Stage::Intake => "INTAKE",
      Stage::Understand => "UNDERSTAND",
      Stage::Prepare => "PREPARE",
      Stage::Ask => "ASK",
      Stage::Wait => "WAIT",
      Stage::Retrieve => "RETRIEVE",
      Stage::Decide => "DECIDE",
      Stage::EscalateUpdate => "ESCALATE_UPDATE",
      Stage::Generate => "GENERATE",
      Stage::Act => "ACT",
      Stage::Complete => "COMPLETE",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Stage {
  type Err = WorkflowError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Stage::ALL
      .into_iter()
      .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| WorkflowError::UnknownStage(s.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_stage_round_trips_through_str() {
    for stage in Stage::ALL {
      assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
    }
    assert_eq!("escalate_update".parse::<Stage>().unwrap(), Stage::EscalateUpdate);
  }

  #[test]
  fn test_stage_serde_matches_display() {
    let json = serde_json::to_string(&Stage::EscalateUpdate).unwrap();
    assert_eq!(json, "\"ESCALATE_UPDATE\"");
  }

  #[test]
  fn test_unknown_stage() {
    assert!(matches!(
      "REVIEW".parse::<Stage>(),
      Err(WorkflowError::UnknownStage(s)) if s == "REVIEW"
    ));
  }
}
