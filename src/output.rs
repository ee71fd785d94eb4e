//! The JSON report printed by `langie run --json`.

use langie_config::Priority;
use langie_workflow::{AuditLedger, Entities, Stage, WorkflowRecord};
use serde::Serialize;

const AUTOMATED_RESOLUTION: &str = "Automated Resolution";

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
  pub final_payload: FinalPayload<'a>,
  pub logs: &'a AuditLedger,
}

#[derive(Debug, Serialize)]
pub struct FinalPayload<'a> {
  pub run_id: &'a str,
  pub requester_name: &'a str,
  pub requester_contact: &'a str,
  pub query_text: &'a str,
  pub priority: Priority,
  pub entities: &'a Entities,
  pub normalized_fields: NormalizedFields,
  pub retrieved_info: Vec<RetrievedInfo<'a>>,
  pub decision: Decision<'a>,
  pub response: &'a str,
  pub retrieval_summary: &'a str,
  pub actions_taken: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedFields {
  pub priority_score: u8,
  pub sla_risk: String,
  pub ticket_status: String,
}

#[derive(Debug, Serialize)]
pub struct RetrievedInfo<'a> {
  pub source: &'static str,
  pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Decision<'a> {
  pub solution_score: u8,
  pub escalated: bool,
  pub assigned_to: &'a str,
  pub reason: &'a str,
}

impl<'a> RunReport<'a> {
  pub fn new(record: &'a WorkflowRecord) -> Self {
    let sla_risk = record.flags.sla_risk.unwrap_or_default();
    let assigned_to = if record.is_escalated {
      record.escalation_target.as_str()
    } else {
      AUTOMATED_RESOLUTION
    };

    Self {
      final_payload: FinalPayload {
        run_id: &record.run_id,
        requester_name: &record.requester_name,
        requester_contact: &record.requester_contact,
        query_text: &record.query_text,
        priority: record.priority,
        entities: &record.structured_data.entities,
        normalized_fields: NormalizedFields {
          priority_score: priority_score(record.priority),
          sla_risk: title_case(sla_risk.as_str()),
          ticket_status: title_case(record.run_status.as_str()),
        },
        retrieved_info: vec![RetrievedInfo {
          source: "Knowledge Base",
          content: &record.retrieved_content,
        }],
        decision: Decision {
          solution_score: record.confidence_score,
          escalated: record.is_escalated,
          assigned_to,
          reason: &record.decision_rationale,
        },
        response: &record.resolution_summary,
        retrieval_summary: &record.retrieval_summary,
        actions_taken: actions_taken(&record.audit_trail),
      },
      logs: &record.audit_trail,
    }
  }
}

/// Triage score derived from the intake priority.
fn priority_score(priority: Priority) -> u8 {
  match priority {
    Priority::Critical => 98,
    Priority::High => 90,
    Priority::Medium => 80,
    Priority::Low => 70,
  }
}

/// Human-readable names of the actions recorded by ACT.
fn actions_taken(ledger: &AuditLedger) -> Vec<String> {
  ledger
    .iter()
    .filter(|entry| entry.stage == Stage::Act)
    .filter_map(|entry| entry.annotations.get("actions"))
    .filter_map(|actions| actions.as_array())
    .flatten()
    .filter_map(|action| action.get("action").and_then(|a| a.as_str()))
    .map(|action| title_case(&action.replace('_', " ")))
    .collect()
}

/// Upper-case the first letter of every word, lower-case the rest.
fn title_case(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  let mut word_start = true;
  for c in text.chars() {
    if c.is_alphanumeric() {
      if word_start {
        out.extend(c.to_uppercase());
      } else {
        out.extend(c.to_lowercase());
      }
      word_start = false;
    } else {
      out.push(c);
      word_start = true;
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use langie_config::TicketDef;
  use langie_workflow::{AuditDraft, RecordPatch, RunStatus, SlaRisk};
  use serde_json::json;

  fn record() -> WorkflowRecord {
    let ticket = TicketDef {
      run_id: "T-1".to_string(),
      requester_name: "Ada".to_string(),
      requester_contact: "ada@example.com".to_string(),
      query_text: "I was charged twice".to_string(),
      priority: Some("critical".to_string()),
    };
    WorkflowRecord::from_intake(&ticket).unwrap()
  }

  #[test]
  fn test_title_case() {
    assert_eq!(title_case("awaiting_input"), "Awaiting_Input");
    assert_eq!(title_case("execute api calls"), "Execute Api Calls");
    assert_eq!(title_case("HIGH"), "High");
  }

  #[test]
  fn test_priority_score() {
    assert_eq!(priority_score(Priority::Critical), 98);
    assert_eq!(priority_score(Priority::High), 90);
    assert_eq!(priority_score(Priority::Medium), 80);
    assert_eq!(priority_score(Priority::Low), 70);
  }

  #[test]
  fn test_report_for_escalated_run() {
    let mut record = record()
      .apply(RecordPatch {
        confidence_score: Some(42),
        escalation_target: Some("Tier 2 Support".to_string()),
        is_escalated: Some(true),
        decision_rationale: Some("Score < 50".to_string()),
        run_status: Some(RunStatus::Escalated),
        ..Default::default()
      })
      .unwrap();
    record.flags.sla_risk = Some(SlaRisk::High);
    record.audit_trail.append(
      AuditDraft::new(Stage::Act).annotate(
        "actions",
        json!([
          { "action": "execute_api_calls", "status": "completed" },
          { "action": "trigger_notifications", "status": "completed" },
        ]),
      ),
    );

    let report = serde_json::to_value(RunReport::new(&record)).unwrap();
    let payload = &report["final_payload"];
    assert_eq!(payload["priority"], json!("Critical"));
    assert_eq!(payload["normalized_fields"]["priority_score"], json!(98));
    assert_eq!(payload["normalized_fields"]["sla_risk"], json!("High"));
    assert_eq!(payload["normalized_fields"]["ticket_status"], json!("Escalated"));
    assert_eq!(payload["decision"]["assigned_to"], json!("Tier 2 Support"));
    assert_eq!(payload["decision"]["escalated"], json!(true));
    assert_eq!(
      payload["actions_taken"],
      json!(["Execute Api Calls", "Trigger Notifications"])
    );
    assert_eq!(report["logs"].as_array().unwrap().len(), 1);
  }

  #[test]
  fn test_report_for_automated_resolution() {
    let record = record()
      .apply(RecordPatch {
        escalation_target: Some("Tier 2 Support".to_string()),
        is_escalated: Some(false),
        ..Default::default()
      })
      .unwrap();

    let report = serde_json::to_value(RunReport::new(&record)).unwrap();
    let payload = &report["final_payload"];
    assert_eq!(payload["decision"]["assigned_to"], json!(AUTOMATED_RESOLUTION));
    assert_eq!(payload["normalized_fields"]["sla_risk"], json!("Low"));
    assert_eq!(payload["normalized_fields"]["ticket_status"], json!("Started"));
    assert_eq!(payload["actions_taken"], json!([]));
  }
}
