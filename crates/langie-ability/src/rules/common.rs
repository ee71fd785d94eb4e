use async_trait::async_trait;
use langie_workflow::{Entities, Flags, SlaRisk};
use minijinja::{Environment, context};
use serde_json::Value;
use tracing::debug;

use crate::ability::CommonAbility;
use crate::common::{CommonProvider, CommonRequest, CommonResponse};
use crate::error::AbilityError;
use crate::keywords::{AUTH_KEYWORDS, Domain, PAYMENT_KEYWORDS, contains_any};
use crate::templates::{
  self, RATIONALE, RESPONSE_AUTH, RESPONSE_DELIVERY, RESPONSE_GENERAL, RESPONSE_PAYMENT,
};

const SUMMARY_LIMIT: usize = 140;
const SOLUTION_CUES: &[&str] = &["resync", "link", "refund", "duplicate"];

/// COMMON provider backed by keyword rules and text templates.
pub struct RuleCommonProvider {
  env: Environment<'static>,
}

impl RuleCommonProvider {
  pub fn new() -> Self {
    Self {
      env: Environment::new(),
    }
  }

  fn parse_request_text(query: &str) -> Entities {
    let q = query.to_lowercase();
    let mut entities = Entities::default();
    if contains_any(&q, AUTH_KEYWORDS) {
      entities.issue_type = "authentication".to_string();
    }
    if contains_any(&q, PAYMENT_KEYWORDS) {
      entities.issue_type = "payment".to_string();
    }
    if q.contains("invoice") {
      entities
        .extra
        .insert("document".to_string(), Value::String("invoice".to_string()));
    }
    entities
  }

  fn add_flags(priority: &str) -> Flags {
    let sla_risk = if priority.to_lowercase().contains("high") {
      SlaRisk::High
    } else {
      SlaRisk::Low
    };
    Flags {
      sla_risk: Some(sla_risk),
      ..Default::default()
    }
  }

  fn normalize_entities(mut entities: Entities) -> Entities {
    let product = entities
      .extra
      .get("product")
      .and_then(Value::as_str)
      .map(|p| p.trim().to_lowercase());
    if matches!(product.as_deref(), Some("account" | "user account" | "profile")) {
      entities
        .extra
        .insert("product".to_string(), Value::String("User Account".to_string()));
    }
    if matches!(
      entities.issue_type.trim().to_lowercase().as_str(),
      "pwd reset" | "password" | "password reset"
    ) {
      entities.issue_type = "Password Reset".to_string();
    }
    entities
  }

  fn semantic_query(query: &str, entities: &Entities) -> String {
    let focus = entities
      .field("issue_type")
      .or_else(|| entities.field("product"))
      .unwrap_or_else(|| "support".to_string());
    format!("{query} :: intent={focus} :: troubleshooting steps")
  }

  fn summarize(retrieved: &str) -> String {
    let data = retrieved.trim();
    if data.is_empty() {
      return "No relevant knowledge base content found.".to_string();
    }
    let head: String = data.chars().take(SUMMARY_LIMIT).collect();
    if data.chars().count() > SUMMARY_LIMIT {
      format!("Summary: {head}...")
    } else {
      format!("Summary: {head}")
    }
  }

  fn evaluate(query: &str, priority: &str, retrieved: &str) -> i64 {
    let q = query.to_lowercase();
    let kb = retrieved.to_lowercase();
    let mut score: i64 = 60;
    if contains_any(&q, PAYMENT_KEYWORDS) {
      score = 75;
    }
    if contains_any(&q, &["password", "reset", "2fa", "auth"]) {
      score = score.max(70);
    }
    if contains_any(&kb, SOLUTION_CUES) {
      score += 10;
    }
    if matches!(priority.trim().to_lowercase().as_str(), "high" | "critical") {
      score += 5;
    }
    score.clamp(30, 95)
  }

  fn respond(
    &self,
    query: &str,
    solution: &str,
    requester_name: &str,
    entities: &Entities,
    is_escalated: bool,
  ) -> Result<String, AbilityError> {
    let name = match requester_name.trim() {
      "" => "Customer",
      name => name,
    };
    let template = match Domain::dominant(&query.to_lowercase()) {
      Domain::Delivery => RESPONSE_DELIVERY,
      Domain::Auth => RESPONSE_AUTH,
      Domain::Payment => RESPONSE_PAYMENT,
      Domain::General => RESPONSE_GENERAL,
    };
    templates::render(
      &self.env,
      CommonAbility::ResponseGeneration,
      template,
      context! {
        name => name,
        solution => solution.trim(),
        issue => entities.issue_type.to_lowercase(),
        escalated => is_escalated,
      },
    )
  }
}

impl Default for RuleCommonProvider {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl CommonProvider for RuleCommonProvider {
  async fn invoke(&self, request: CommonRequest) -> Result<CommonResponse, AbilityError> {
    let ability = request.ability();
    debug!(%ability, "rule provider invoked");

    let response = match request {
      CommonRequest::ParseRequestText { query } => {
        CommonResponse::ParseRequestText(Self::parse_request_text(&query))
      }
      CommonRequest::NormalizeFields { priority, .. } => CommonResponse::NormalizeFields {
        priority: priority.trim().to_uppercase(),
      },
      CommonRequest::AddFlagsCalculations { priority, .. } => {
        CommonResponse::AddFlagsCalculations(Self::add_flags(&priority))
      }
      CommonRequest::EntityNormalization { entities } => CommonResponse::EntityNormalization {
        entities: Self::normalize_entities(entities),
      },
      CommonRequest::GenerateSemanticQuery { query, entities } => {
        CommonResponse::GenerateSemanticQuery {
          semantic_query: Self::semantic_query(&query, &entities),
        }
      }
      CommonRequest::SummarizeRetrieval { retrieved } => {
        CommonResponse::SummarizeRetrieval(Self::summarize(&retrieved))
      }
      CommonRequest::SolutionEvaluation {
        query,
        priority,
        retrieved,
      } => CommonResponse::SolutionEvaluation {
        score: Self::evaluate(&query, &priority, &retrieved),
        reason: None,
      },
      CommonRequest::DecisionRationale { score, priority } => {
        CommonResponse::DecisionRationale(templates::render(
          &self.env,
          ability,
          RATIONALE,
          context! { score => score, priority => priority },
        )?)
      }
      CommonRequest::ResponseGeneration {
        query,
        solution,
        requester_name,
        entities,
        is_escalated,
        ..
      } => CommonResponse::ResponseGeneration(self.respond(
        &query,
        &solution,
        &requester_name,
        &entities,
        is_escalated,
      )?),
    };
    Ok(response)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn invoke(request: CommonRequest) -> CommonResponse {
    RuleCommonProvider::new().invoke(request).await.unwrap()
  }

  #[tokio::test]
  async fn test_parse_request_text() {
    let response = invoke(CommonRequest::ParseRequestText {
      query: "My invoice shows a duplicate charge".to_string(),
    })
    .await;
    let CommonResponse::ParseRequestText(entities) = response else {
      panic!("unexpected response");
    };
    assert_eq!(entities.issue_type, "payment");
    assert_eq!(entities.field("document").as_deref(), Some("invoice"));
  }

  #[tokio::test]
  async fn test_normalize_and_flags() {
    let response = invoke(CommonRequest::NormalizeFields {
      priority: "High".to_string(),
      run_id: "TCK-1".to_string(),
    })
    .await;
    assert_eq!(
      response,
      CommonResponse::NormalizeFields {
        priority: "HIGH".to_string()
      }
    );

    let CommonResponse::AddFlagsCalculations(flags) = invoke(CommonRequest::AddFlagsCalculations {
      priority: "Low".to_string(),
      query: String::new(),
    })
    .await
    else {
      panic!("unexpected response");
    };
    assert_eq!(flags.sla_risk, Some(SlaRisk::Low));
  }

  #[tokio::test]
  async fn test_entity_normalization_synonyms() {
    let mut entities = Entities {
      issue_type: "pwd reset".to_string(),
      ..Default::default()
    };
    entities
      .extra
      .insert("product".to_string(), Value::String("Profile".to_string()));

    let CommonResponse::EntityNormalization { entities } =
      invoke(CommonRequest::EntityNormalization { entities }).await
    else {
      panic!("unexpected response");
    };
    assert_eq!(entities.issue_type, "Password Reset");
    assert_eq!(entities.field("product").as_deref(), Some("User Account"));
  }

  #[tokio::test]
  async fn test_semantic_query_focus() {
    let response = invoke(CommonRequest::GenerateSemanticQuery {
      query: "help".to_string(),
      entities: Entities::default(),
    })
    .await;
    assert_eq!(
      response,
      CommonResponse::GenerateSemanticQuery {
        semantic_query: "help :: intent=support :: troubleshooting steps".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_summary_truncates() {
    let long = "x".repeat(200);
    let CommonResponse::SummarizeRetrieval(summary) =
      invoke(CommonRequest::SummarizeRetrieval { retrieved: long }).await
    else {
      panic!("unexpected response");
    };
    assert_eq!(summary.len(), "Summary: ".len() + 140 + 3);
    assert!(summary.ends_with("..."));
  }

  #[tokio::test]
  async fn test_solution_score() {
    let response = invoke(CommonRequest::SolutionEvaluation {
      query: "reset my password".to_string(),
      priority: "HIGH".to_string(),
      retrieved: "use the latest reset link".to_string(),
    })
    .await;
    // 70 for account access, +10 for a concrete fix, +5 for priority.
    assert_eq!(
      response,
      CommonResponse::SolutionEvaluation {
        score: 85,
        reason: None
      }
    );

    let response = invoke(CommonRequest::SolutionEvaluation {
      query: "hello".to_string(),
      priority: "low".to_string(),
      retrieved: String::new(),
    })
    .await;
    assert_eq!(
      response,
      CommonResponse::SolutionEvaluation {
        score: 60,
        reason: None
      }
    );
  }

  #[tokio::test]
  async fn test_response_generation_domains() {
    let CommonResponse::ResponseGeneration(text) = invoke(CommonRequest::ResponseGeneration {
      query: "my package tracking says in transit, delivery late".to_string(),
      solution: String::new(),
      requester_name: "Ada".to_string(),
      entities: Entities::default(),
      score: 80,
      is_escalated: false,
    })
    .await
    else {
      panic!("unexpected response");
    };
    assert!(text.starts_with("Hello Ada, we see the delivery appears delayed."));

    let CommonResponse::ResponseGeneration(text) = invoke(CommonRequest::ResponseGeneration {
      query: "2fa codes missing".to_string(),
      solution: "Resync the app.".to_string(),
      requester_name: String::new(),
      entities: Entities::default(),
      score: 40,
      is_escalated: true,
    })
    .await
    else {
      panic!("unexpected response");
    };
    assert!(text.starts_with("Hello Customer, we understand the urgency"));
    assert!(text.contains("Resync the app."));
    assert!(text.contains("escalated"));
  }
}
