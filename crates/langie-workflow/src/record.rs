use std::collections::BTreeSet;
use std::fmt;

use langie_config::{Priority, TicketDef};
use serde::{Deserialize, Serialize};

use crate::audit::AuditLedger;
use crate::entities::{Flags, StructuredData};
use crate::error::WorkflowError;
use crate::patch::RecordPatch;
use crate::stage::Stage;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
  #[default]
  Started,
  AwaitingInput,
  InputReceived,
  Resolved,
  Escalated,
}

impl RunStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, RunStatus::Resolved | RunStatus::Escalated)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      RunStatus::Started => "started",
      RunStatus::AwaitingInput => "awaiting_input",
      RunStatus::InputReceived => "input_received",
      RunStatus::Resolved => "resolved",
      RunStatus::Escalated => "escalated",
    }
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Route computed at DECIDE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
  Escalate,
  Act,
  Respond,
}

impl Route {
  /// The downstream stage this route selects.
  pub fn branch_stage(&self) -> Stage {
    match self {
      Route::Escalate => Stage::EscalateUpdate,
      Route::Act => Stage::Act,
      Route::Respond => Stage::Generate,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Route::Escalate => "escalate",
      Route::Act => "act",
      Route::Respond => "respond",
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The document threaded through every stage of a run.
///
/// Fields are grouped by the stage that first makes them meaningful. Intake
/// fields are set once by [`WorkflowRecord::from_intake`]; everything else
/// changes only through [`WorkflowRecord::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
  // Intake
  pub run_id: String,
  pub requester_name: String,
  pub requester_contact: String,
  pub query_text: String,
  pub priority: Priority,

  // Understanding
  #[serde(default)]
  pub structured_data: StructuredData,
  #[serde(default)]
  pub missing_fields: BTreeSet<String>,

  // Preparation
  #[serde(default)]
  pub normalized_priority: String,
  #[serde(default)]
  pub enriched_data: serde_json::Map<String, serde_json::Value>,
  #[serde(default)]
  pub flags: Flags,

  // Clarification
  #[serde(default)]
  pub clarification_prompt: String,
  #[serde(default)]
  pub customer_reply: String,

  // Retrieval
  #[serde(default)]
  pub retrieved_content: String,
  #[serde(default)]
  pub retrieval_summary: String,

  // Decision
  #[serde(default)]
  pub confidence_score: u8,
  #[serde(default)]
  pub escalation_target: String,
  #[serde(default)]
  pub route: Option<Route>,
  #[serde(default)]
  pub is_escalated: bool,
  #[serde(default)]
  pub decision_rationale: String,

  // Resolution
  #[serde(default)]
  pub resolution_summary: String,
  #[serde(default)]
  pub run_status: RunStatus,

  #[serde(default)]
  pub audit_trail: AuditLedger,
}

impl WorkflowRecord {
  /// Build the initial record for a run.
  ///
  /// Refuses intakes without a run id, query text or priority.
  pub fn from_intake(ticket: &TicketDef) -> Result<Self, WorkflowError> {
    if ticket.run_id.trim().is_empty() {
      return Err(WorkflowError::MissingField("run_id"));
    }
    if ticket.query_text.trim().is_empty() {
      return Err(WorkflowError::MissingField("query_text"));
    }
    let priority: Priority = match ticket.priority.as_deref().map(str::trim) {
      None | Some("") => return Err(WorkflowError::MissingField("priority")),
      Some(p) => p.parse()?,
    };

    Ok(Self {
      run_id: ticket.run_id.trim().to_string(),
      requester_name: ticket.requester_name.clone(),
      requester_contact: ticket.requester_contact.clone(),
      query_text: ticket.query_text.clone(),
      priority,
      structured_data: StructuredData::default(),
      missing_fields: BTreeSet::new(),
      normalized_priority: String::new(),
      enriched_data: serde_json::Map::new(),
      flags: Flags::default(),
      clarification_prompt: String::new(),
      customer_reply: String::new(),
      retrieved_content: String::new(),
      retrieval_summary: String::new(),
      confidence_score: 0,
      escalation_target: String::new(),
      route: None,
      is_escalated: false,
      decision_rationale: String::new(),
      resolution_summary: String::new(),
      run_status: RunStatus::Started,
      audit_trail: AuditLedger::default(),
    })
  }

  pub fn is_terminal(&self) -> bool {
    self.run_status.is_terminal()
  }

  /// The priority the decision stages should use: the normalized one once
  /// PREPARE has run, the intake one before.
  pub fn effective_priority(&self) -> String {
    if self.normalized_priority.is_empty() {
      self.priority.to_string()
    } else {
      self.normalized_priority.clone()
    }
  }

  /// Apply a stage delta, producing the next record.
  ///
  /// Only fields present in the patch change. Once the run is terminal the
  /// decision fields and the run status are frozen.
  pub fn apply(self, patch: RecordPatch) -> Result<Self, WorkflowError> {
    if self.is_terminal()
      && let Some(field) = patch.frozen_field_change(&self)
    {
      return Err(WorkflowError::TerminalRecord {
        run_id: self.run_id,
        status: self.run_status.to_string(),
        field,
      });
    }

    let mut next = self;
    if let Some(v) = patch.structured_data {
      next.structured_data = v;
    }
    if let Some(v) = patch.missing_fields {
      next.missing_fields = v;
    }
    if let Some(v) = patch.normalized_priority {
      next.normalized_priority = v;
    }
    if let Some(v) = patch.enriched_data {
      next.enriched_data = v;
    }
    if let Some(v) = patch.flags {
      next.flags = v;
    }
    if let Some(v) = patch.clarification_prompt {
      next.clarification_prompt = v;
    }
    if let Some(v) = patch.customer_reply {
      next.customer_reply = v;
    }
    if let Some(v) = patch.retrieved_content {
      next.retrieved_content = v;
    }
    if let Some(v) = patch.retrieval_summary {
      next.retrieval_summary = v;
    }
    if let Some(v) = patch.confidence_score {
      next.confidence_score = v;
    }
    if let Some(v) = patch.escalation_target {
      next.escalation_target = v;
    }
    if let Some(v) = patch.route {
      next.route = Some(v);
    }
    if let Some(v) = patch.is_escalated {
      next.is_escalated = v;
    }
    if let Some(v) = patch.decision_rationale {
      next.decision_rationale = v;
    }
    if let Some(v) = patch.resolution_summary {
      next.resolution_summary = v;
    }
    if let Some(v) = patch.run_status {
      next.run_status = v;
    }
    Ok(next)
  }
}
