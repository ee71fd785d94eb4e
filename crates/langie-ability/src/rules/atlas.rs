use async_trait::async_trait;
use langie_workflow::{Entities, REQUIRED_ENTITY_FIELDS, StructuredData};
use serde_json::json;
use tracing::{debug, info};

use crate::atlas::{AtlasProvider, AtlasRequest, AtlasResponse};
use crate::error::AbilityError;
use crate::keywords::{AUTH_KEYWORDS, DELIVERY_KEYWORDS, PAYMENT_KEYWORDS, contains_any};
use crate::knowledge::KnowledgeBase;

const ESCALATION_SENIOR: &str = "Senior Software Engineer - Immediate";
const ESCALATION_TIER2: &str = "Tier 2 Support";

/// ATLAS provider backed by keyword rules and a local knowledge base.
///
/// Ticket and notification abilities only log and acknowledge.
pub struct RuleAtlasProvider {
  knowledge: KnowledgeBase,
}

impl RuleAtlasProvider {
  pub fn new(knowledge: KnowledgeBase) -> Self {
    Self { knowledge }
  }

  fn extract_entities(query: &str) -> Entities {
    let q = query.to_lowercase();
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();

    if contains_any(&q, AUTH_KEYWORDS) {
      Entities {
        issue_type: "Authentication".to_string(),
        affected_component: "2FA".to_string(),
        problem_description: strings(&["codes not arriving", "app out-of-sync"]),
        ..Default::default()
      }
    } else if contains_any(&q, DELIVERY_KEYWORDS) {
      Entities {
        issue_type: "Delivery".to_string(),
        affected_component: "Logistics".to_string(),
        problem_description: strings(&["delayed delivery", "tracking shows in transit"]),
        request_type: "expedite delivery".to_string(),
        ..Default::default()
      }
    } else if contains_any(&q, PAYMENT_KEYWORDS) {
      Entities {
        issue_type: "Payment".to_string(),
        affected_component: "Billing".to_string(),
        problem_description: strings(&["duplicate charge"]),
        request_type: "refund".to_string(),
        ..Default::default()
      }
    } else {
      Entities::default()
    }
  }

  fn clarify(structured_data: &StructuredData) -> String {
    let missing: Vec<&str> = REQUIRED_ENTITY_FIELDS
      .iter()
      .copied()
      .filter(|key| structured_data.entities.field(key).is_none())
      .collect();
    if missing.is_empty() {
      "Could you share any reference IDs or screenshots to help us proceed?".to_string()
    } else {
      format!(
        "Could you provide more details for: {}?",
        missing.join(", ")
      )
    }
  }

  fn escalation_target(score: u8) -> String {
    if score < 50 {
      ESCALATION_SENIOR.to_string()
    } else {
      ESCALATION_TIER2.to_string()
    }
  }
}

impl Default for RuleAtlasProvider {
  fn default() -> Self {
    Self::new(KnowledgeBase::builtin())
  }
}

#[async_trait]
impl AtlasProvider for RuleAtlasProvider {
  async fn invoke(&self, request: AtlasRequest) -> Result<AtlasResponse, AbilityError> {
    let ability = request.ability();
    debug!(%ability, "rule provider invoked");

    let response = match request {
      AtlasRequest::ExtractEntities { query } => AtlasResponse::ExtractEntities {
        entities: Self::extract_entities(&query),
      },
      AtlasRequest::EnrichRecords { .. } => {
        let mut enrichment = serde_json::Map::new();
        enrichment.insert("sla_in_hours".to_string(), json!(1));
        enrichment.insert("historical_tickets".to_string(), json!(0));
        AtlasResponse::EnrichRecords(enrichment)
      }
      AtlasRequest::ClarifyQuestion {
        structured_data, ..
      } => AtlasResponse::ClarifyQuestion {
        question: Self::clarify(&structured_data),
      },
      AtlasRequest::ExtractAnswer { reply } => AtlasResponse::ExtractAnswer {
        answer: reply.trim().to_string(),
      },
      AtlasRequest::KnowledgeBaseSearch { query, context } => AtlasResponse::KnowledgeBaseSearch {
        data: self
          .knowledge
          .search(&query, &context)
          .map(|article| article.content.clone())
          .unwrap_or_default(),
      },
      AtlasRequest::EscalationDecision { score, .. } => {
        AtlasResponse::EscalationDecision(Self::escalation_target(score))
      }
      AtlasRequest::UpdateTicket {
        run_id,
        status,
        priority,
      } => {
        info!(%run_id, %status, %priority, "ticket updated");
        AtlasResponse::UpdateTicket(true)
      }
      AtlasRequest::CloseTicket { run_id } => {
        info!(%run_id, "ticket closed");
        AtlasResponse::CloseTicket(true)
      }
      AtlasRequest::ExecuteApiCalls {
        run_id,
        action_type,
      } => {
        info!(%run_id, %action_type, "api calls executed");
        AtlasResponse::ExecuteApiCalls(true)
      }
      AtlasRequest::TriggerNotifications {
        contact,
        notification_type,
      } => {
        info!(%contact, %notification_type, "notification triggered");
        AtlasResponse::TriggerNotifications(true)
      }
    };
    Ok(response)
  }
}
