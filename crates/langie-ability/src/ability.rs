use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AbilityError;

/// The two capability sources the executor talks to.
///
/// COMMON hosts the stateless text abilities, ATLAS the ones that reach
/// external systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderId {
  Common,
  Atlas,
}

impl ProviderId {
  pub fn as_str(&self) -> &'static str {
    match self {
      ProviderId::Common => "COMMON",
      ProviderId::Atlas => "ATLAS",
    }
  }
}

impl fmt::Display for ProviderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ProviderId {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "common" | "a" => Ok(ProviderId::Common),
      "atlas" | "b" => Ok(ProviderId::Atlas),
      other => Err(format!("unknown provider: {other}")),
    }
  }
}

macro_rules! ability_enum {
  (
    $(#[$meta:meta])*
    $name:ident, $provider:expr, { $($variant:ident => $label:literal),+ $(,)? }
  ) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum $name {
      $($variant),+
    }

    impl $name {
      pub const ALL: &'static [$name] = &[$($name::$variant),+];

      pub fn as_str(&self) -> &'static str {
        match self {
          $($name::$variant => $label),+
        }
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $name {
      type Err = AbilityError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
          $($label => Ok($name::$variant),)+
          other => Err(AbilityError::UnknownAbility {
            provider: $provider,
            ability: other.to_string(),
          }),
        }
      }
    }
  };
}

ability_enum!(
  /// Abilities exposed by the COMMON provider.
  CommonAbility, ProviderId::Common, {
    ParseRequestText => "parse_request_text",
    NormalizeFields => "normalize_fields",
    AddFlagsCalculations => "add_flags_calculations",
    EntityNormalization => "entity_normalization",
    GenerateSemanticQuery => "generate_semantic_query",
    SummarizeRetrieval => "summarize_retrieval",
    SolutionEvaluation => "solution_evaluation",
    DecisionRationale => "decision_rationale",
    ResponseGeneration => "response_generation",
  }
);

ability_enum!(
  /// Abilities exposed by the ATLAS provider.
  AtlasAbility, ProviderId::Atlas, {
    ExtractEntities => "extract_entities",
    EnrichRecords => "enrich_records",
    ClarifyQuestion => "clarify_question",
    ExtractAnswer => "extract_answer",
    KnowledgeBaseSearch => "knowledge_base_search",
    EscalationDecision => "escalation_decision",
    UpdateTicket => "update_ticket",
    CloseTicket => "close_ticket",
    ExecuteApiCalls => "execute_api_calls",
    TriggerNotifications => "trigger_notifications",
  }
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_known_abilities() {
    for ability in CommonAbility::ALL {
      assert_eq!(ability.as_str().parse::<CommonAbility>().unwrap(), *ability);
    }
    for ability in AtlasAbility::ALL {
      assert_eq!(ability.as_str().parse::<AtlasAbility>().unwrap(), *ability);
    }
  }

  #[test]
  fn test_unknown_ability_names_provider() {
    let err = "extract_entities".parse::<CommonAbility>().unwrap_err();
    match err {
      AbilityError::UnknownAbility { provider, ability } => {
        assert_eq!(provider, ProviderId::Common);
        assert_eq!(ability, "extract_entities");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn test_provider_id() {
    assert_eq!("atlas".parse::<ProviderId>().unwrap(), ProviderId::Atlas);
    assert_eq!(ProviderId::Common.to_string(), "COMMON");
    assert!("crm".parse::<ProviderId>().is_err());
  }
}
