//! The ATLAS provider contract.

use async_trait::async_trait;
use langie_workflow::{Entities, StructuredData};
use serde::{Deserialize, Serialize};

use crate::ability::{AtlasAbility, ProviderId};
use crate::error::AbilityError;

/// A request to one ATLAS ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ability", rename_all = "snake_case")]
pub enum AtlasRequest {
  ExtractEntities {
    #[serde(default)]
    query: String,
  },
  EnrichRecords {
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    contact: String,
  },
  ClarifyQuestion {
    #[serde(default)]
    query: String,
    #[serde(default)]
    structured_data: StructuredData,
  },
  ExtractAnswer {
    #[serde(default)]
    reply: String,
  },
  KnowledgeBaseSearch {
    #[serde(default)]
    query: String,
    /// Entity text scored alongside the query.
    #[serde(default)]
    context: String,
  },
  EscalationDecision {
    #[serde(default)]
    query: String,
    #[serde(default)]
    score: u8,
  },
  UpdateTicket {
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    priority: String,
  },
  CloseTicket {
    #[serde(default)]
    run_id: String,
  },
  ExecuteApiCalls {
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    action_type: String,
  },
  TriggerNotifications {
    #[serde(default)]
    contact: String,
    #[serde(default)]
    notification_type: String,
  },
}

impl AtlasRequest {
  pub fn ability(&self) -> AtlasAbility {
    match self {
      AtlasRequest::ExtractEntities { .. } => AtlasAbility::ExtractEntities,
      AtlasRequest::EnrichRecords { .. } => AtlasAbility::EnrichRecords,
      AtlasRequest::ClarifyQuestion { .. } => AtlasAbility::ClarifyQuestion,
      AtlasRequest::ExtractAnswer { .. } => AtlasAbility::ExtractAnswer,
      AtlasRequest::KnowledgeBaseSearch { .. } => AtlasAbility::KnowledgeBaseSearch,
      AtlasRequest::EscalationDecision { .. } => AtlasAbility::EscalationDecision,
      AtlasRequest::UpdateTicket { .. } => AtlasAbility::UpdateTicket,
      AtlasRequest::CloseTicket { .. } => AtlasAbility::CloseTicket,
      AtlasRequest::ExecuteApiCalls { .. } => AtlasAbility::ExecuteApiCalls,
      AtlasRequest::TriggerNotifications { .. } => AtlasAbility::TriggerNotifications,
    }
  }

  /// Build a request from an ability name and a JSON object of fields.
  ///
  /// An unknown name fails before the fields are looked at.
  pub fn from_parts(ability: &str, fields: serde_json::Value) -> Result<Self, AbilityError> {
    let ability: AtlasAbility = ability.parse()?;
    let value = crate::tagged(ability.as_str(), fields).map_err(|message| {
      AbilityError::InvalidRequest {
        provider: ProviderId::Atlas,
        ability: ability.to_string(),
        message,
      }
    })?;
    serde_json::from_value(value).map_err(|e| AbilityError::InvalidRequest {
      provider: ProviderId::Atlas,
      ability: ability.to_string(),
      message: e.to_string(),
    })
  }
}

/// The answer of one ATLAS ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ability", content = "output", rename_all = "snake_case")]
pub enum AtlasResponse {
  ExtractEntities { entities: Entities },
  EnrichRecords(serde_json::Map<String, serde_json::Value>),
  ClarifyQuestion { question: String },
  ExtractAnswer { answer: String },
  KnowledgeBaseSearch { data: String },
  EscalationDecision(String),
  UpdateTicket(bool),
  CloseTicket(bool),
  ExecuteApiCalls(bool),
  TriggerNotifications(bool),
}

impl AtlasResponse {
  pub fn ability(&self) -> AtlasAbility {
    match self {
      AtlasResponse::ExtractEntities { .. } => AtlasAbility::ExtractEntities,
      AtlasResponse::EnrichRecords(_) => AtlasAbility::EnrichRecords,
      AtlasResponse::ClarifyQuestion { .. } => AtlasAbility::ClarifyQuestion,
      AtlasResponse::ExtractAnswer { .. } => AtlasAbility::ExtractAnswer,
      AtlasResponse::KnowledgeBaseSearch { .. } => AtlasAbility::KnowledgeBaseSearch,
      AtlasResponse::EscalationDecision(_) => AtlasAbility::EscalationDecision,
      AtlasResponse::UpdateTicket(_) => AtlasAbility::UpdateTicket,
      AtlasResponse::CloseTicket(_) => AtlasAbility::CloseTicket,
      AtlasResponse::ExecuteApiCalls(_) => AtlasAbility::ExecuteApiCalls,
      AtlasResponse::TriggerNotifications(_) => AtlasAbility::TriggerNotifications,
    }
  }

  /// The response substituted when a call fails and the caller opted into
  /// neutral fallbacks.
  pub fn neutral(ability: AtlasAbility) -> Self {
    match ability {
      AtlasAbility::ExtractEntities => AtlasResponse::ExtractEntities {
        entities: Entities::default(),
      },
      AtlasAbility::EnrichRecords => AtlasResponse::EnrichRecords(serde_json::Map::new()),
      AtlasAbility::ClarifyQuestion => AtlasResponse::ClarifyQuestion {
        question: String::new(),
      },
      AtlasAbility::ExtractAnswer => AtlasResponse::ExtractAnswer {
        answer: String::new(),
      },
      AtlasAbility::KnowledgeBaseSearch => AtlasResponse::KnowledgeBaseSearch {
        data: String::new(),
      },
      AtlasAbility::EscalationDecision => AtlasResponse::EscalationDecision(String::new()),
      AtlasAbility::UpdateTicket => AtlasResponse::UpdateTicket(false),
      AtlasAbility::CloseTicket => AtlasResponse::CloseTicket(false),
      AtlasAbility::ExecuteApiCalls => AtlasResponse::ExecuteApiCalls(false),
      AtlasAbility::TriggerNotifications => AtlasResponse::TriggerNotifications(false),
    }
  }

  /// Error for a response that does not answer `expected`.
  pub fn mismatch(&self, expected: AtlasAbility) -> AbilityError {
    AbilityError::UnexpectedResponse {
      provider: ProviderId::Atlas,
      expected: expected.to_string(),
      actual: self.ability().to_string(),
    }
  }

  /// The acknowledgement flag of a ticket or notification ability.
  pub fn ack(&self) -> Option<bool> {
    match self {
      AtlasResponse::UpdateTicket(ack)
      | AtlasResponse::CloseTicket(ack)
      | AtlasResponse::ExecuteApiCalls(ack)
      | AtlasResponse::TriggerNotifications(ack) => Some(*ack),
      _ => None,
    }
  }
}

/// Provider B: abilities that reach external systems.
#[async_trait]
pub trait AtlasProvider: Send + Sync {
  /// Invoke a single ability.
  async fn invoke(&self, request: AtlasRequest) -> Result<AtlasResponse, AbilityError>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_from_parts_defaults_missing_fields() {
    let request = AtlasRequest::from_parts("close_ticket", json!({})).unwrap();
    assert_eq!(
      request,
      AtlasRequest::CloseTicket {
        run_id: String::new()
      }
    );
  }

  #[test]
  fn test_from_parts_reads_structured_data() {
    let request = AtlasRequest::from_parts(
      "clarify_question",
      json!({
        "query": "help",
        "structured_data": { "entities": { "issue_type": "Payment" } }
      }),
    )
    .unwrap();
    match request {
      AtlasRequest::ClarifyQuestion {
        structured_data, ..
      } => assert_eq!(structured_data.entities.issue_type, "Payment"),
      other => panic!("unexpected request: {other:?}"),
    }
  }

  #[test]
  fn test_unknown_ability() {
    let err = AtlasRequest::from_parts("parse_request_text", json!({})).unwrap_err();
    assert_eq!(err.provider(), ProviderId::Atlas);
    assert_eq!(err.ability(), "parse_request_text");
  }

  #[test]
  fn test_neutral_acks_are_false() {
    assert_eq!(
      AtlasResponse::neutral(AtlasAbility::CloseTicket).ack(),
      Some(false)
    );
    for ability in AtlasAbility::ALL {
      assert_eq!(AtlasResponse::neutral(*ability).ability(), *ability);
    }
  }
}
