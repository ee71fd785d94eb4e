//! The COMMON provider contract.

use async_trait::async_trait;
use langie_workflow::{Entities, Flags};
use serde::{Deserialize, Serialize};

use crate::ability::{CommonAbility, ProviderId};
use crate::error::AbilityError;

/// A request to one COMMON ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ability", rename_all = "snake_case")]
pub enum CommonRequest {
  ParseRequestText {
    #[serde(default)]
    query: String,
  },
  NormalizeFields {
    #[serde(default)]
    priority: String,
    #[serde(default)]
    run_id: String,
  },
  AddFlagsCalculations {
    #[serde(default)]
    priority: String,
    #[serde(default)]
    query: String,
  },
  EntityNormalization {
    #[serde(default)]
    entities: Entities,
  },
  GenerateSemanticQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    entities: Entities,
  },
  SummarizeRetrieval {
    #[serde(default)]
    retrieved: String,
  },
  SolutionEvaluation {
    #[serde(default)]
    query: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    retrieved: String,
  },
  DecisionRationale {
    #[serde(default)]
    score: u8,
    #[serde(default)]
    priority: String,
  },
  ResponseGeneration {
    #[serde(default)]
    query: String,
    #[serde(default)]
    solution: String,
    #[serde(default)]
    requester_name: String,
    #[serde(default)]
    entities: Entities,
    #[serde(default)]
    score: u8,
    #[serde(default)]
    is_escalated: bool,
  },
}

impl CommonRequest {
  pub fn ability(&self) -> CommonAbility {
    match self {
      CommonRequest::ParseRequestText { .. } => CommonAbility::ParseRequestText,
      CommonRequest::NormalizeFields { .. } => CommonAbility::NormalizeFields,
      CommonRequest::AddFlagsCalculations { .. } => CommonAbility::AddFlagsCalculations,
      CommonRequest::EntityNormalization { .. } => CommonAbility::EntityNormalization,
      CommonRequest::GenerateSemanticQuery { .. } => CommonAbility::GenerateSemanticQuery,
      CommonRequest::SummarizeRetrieval { .. } => CommonAbility::SummarizeRetrieval,
      CommonRequest::SolutionEvaluation { .. } => CommonAbility::SolutionEvaluation,
      CommonRequest::DecisionRationale { .. } => CommonAbility::DecisionRationale,
      CommonRequest::ResponseGeneration { .. } => CommonAbility::ResponseGeneration,
    }
  }

  /// Build a request from an ability name and a JSON object of fields.
  ///
  /// An unknown name fails before the fields are looked at.
  pub fn from_parts(ability: &str, fields: serde_json::Value) -> Result<Self, AbilityError> {
    let ability: CommonAbility = ability.parse()?;
    let value = crate::tagged(ability.as_str(), fields).map_err(|message| {
      AbilityError::InvalidRequest {
        provider: ProviderId::Common,
        ability: ability.to_string(),
        message,
      }
    })?;
    serde_json::from_value(value).map_err(|e| AbilityError::InvalidRequest {
      provider: ProviderId::Common,
      ability: ability.to_string(),
      message: e.to_string(),
    })
  }
}

/// The answer of one COMMON ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ability", content = "output", rename_all = "snake_case")]
pub enum CommonResponse {
  ParseRequestText(Entities),
  NormalizeFields { priority: String },
  AddFlagsCalculations(Flags),
  EntityNormalization { entities: Entities },
  GenerateSemanticQuery { semantic_query: String },
  SummarizeRetrieval(String),
  /// Raw score as the backend produced it; callers clamp.
  SolutionEvaluation {
    score: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
  },
  DecisionRationale(String),
  ResponseGeneration(String),
}

impl CommonResponse {
  pub fn ability(&self) -> CommonAbility {
    match self {
      CommonResponse::ParseRequestText(_) => CommonAbility::ParseRequestText,
      CommonResponse::NormalizeFields { .. } => CommonAbility::NormalizeFields,
      CommonResponse::AddFlagsCalculations(_) => CommonAbility::AddFlagsCalculations,
      CommonResponse::EntityNormalization { .. } => CommonAbility::EntityNormalization,
      CommonResponse::GenerateSemanticQuery { .. } => CommonAbility::GenerateSemanticQuery,
      CommonResponse::SummarizeRetrieval(_) => CommonAbility::SummarizeRetrieval,
      CommonResponse::SolutionEvaluation { .. } => CommonAbility::SolutionEvaluation,
      CommonResponse::DecisionRationale(_) => CommonAbility::DecisionRationale,
      CommonResponse::ResponseGeneration(_) => CommonAbility::ResponseGeneration,
    }
  }

  /// The response substituted when a call fails and the caller opted into
  /// neutral fallbacks.
  pub fn neutral(ability: CommonAbility) -> Self {
    match ability {
      CommonAbility::ParseRequestText => CommonResponse::ParseRequestText(Entities::default()),
      CommonAbility::NormalizeFields => CommonResponse::NormalizeFields {
        priority: String::new(),
      },
      CommonAbility::AddFlagsCalculations => CommonResponse::AddFlagsCalculations(Flags::default()),
      CommonAbility::EntityNormalization => CommonResponse::EntityNormalization {
        entities: Entities::default(),
      },
      CommonAbility::GenerateSemanticQuery => CommonResponse::GenerateSemanticQuery {
        semantic_query: String::new(),
      },
      CommonAbility::SummarizeRetrieval => CommonResponse::SummarizeRetrieval(String::new()),
      CommonAbility::SolutionEvaluation => CommonResponse::SolutionEvaluation {
        score: 50,
        reason: None,
      },
      CommonAbility::DecisionRationale => CommonResponse::DecisionRationale(String::new()),
      CommonAbility::ResponseGeneration => CommonResponse::ResponseGeneration(String::new()),
    }
  }

  /// Error for a response that does not answer `expected`.
  pub fn mismatch(&self, expected: CommonAbility) -> AbilityError {
    AbilityError::UnexpectedResponse {
      provider: ProviderId::Common,
      expected: expected.to_string(),
      actual: self.ability().to_string(),
    }
  }
}

/// Provider A: stateless text abilities.
#[async_trait]
pub trait CommonProvider: Send + Sync {
  /// Invoke a single ability.
  async fn invoke(&self, request: CommonRequest) -> Result<CommonResponse, AbilityError>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_from_parts() {
    let request = CommonRequest::from_parts(
      "decision_rationale",
      json!({ "score": 42, "priority": "HIGH" }),
    )
    .unwrap();
    assert_eq!(
      request,
      CommonRequest::DecisionRationale {
        score: 42,
        priority: "HIGH".to_string()
      }
    );
    assert_eq!(request.ability(), CommonAbility::DecisionRationale);
  }

  #[test]
  fn test_from_parts_unknown_ability() {
    let err = CommonRequest::from_parts("knowledge_base_search", json!({})).unwrap_err();
    assert!(matches!(err, AbilityError::UnknownAbility { .. }));
  }

  #[test]
  fn test_from_parts_rejects_bad_fields() {
    let err = CommonRequest::from_parts("decision_rationale", json!({ "score": "lots" }))
      .unwrap_err();
    assert!(matches!(err, AbilityError::InvalidRequest { .. }));

    let err = CommonRequest::from_parts("decision_rationale", json!(["score"])).unwrap_err();
    assert!(matches!(err, AbilityError::InvalidRequest { .. }));
  }

  #[test]
  fn test_neutral_matches_ability() {
    for ability in CommonAbility::ALL {
      assert_eq!(CommonResponse::neutral(*ability).ability(), *ability);
    }
  }
}
