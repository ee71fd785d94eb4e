use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entities::{Flags, StructuredData};
use crate::record::{Route, RunStatus, WorkflowRecord};

/// The delta a stage returns.
///
/// Every field is optional; absent fields leave the record untouched when
/// the patch is applied. Intake fields and the audit trail are deliberately
/// not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub structured_data: Option<StructuredData>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub missing_fields: Option<BTreeSet<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub normalized_priority: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub enriched_data: Option<serde_json::Map<String, serde_json::Value>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flags: Option<Flags>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub clarification_prompt: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub customer_reply: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retrieved_content: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retrieval_summary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub confidence_score: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub escalation_target: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub route: Option<Route>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_escalated: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub decision_rationale: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolution_summary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub run_status: Option<RunStatus>,
}

impl RecordPatch {
  /// A patch carrying only the requester's clarification reply.
  pub fn reply(reply: impl Into<String>) -> Self {
    Self {
      customer_reply: Some(reply.into()),
      ..Default::default()
    }
  }

  /// The first decision field (or run status) whose value would change if
  /// this patch were applied to `record`.
  pub(crate) fn frozen_field_change(&self, record: &WorkflowRecord) -> Option<&'static str> {
    fn differs<T: PartialEq>(new: &Option<T>, old: &T) -> bool {
      new.as_ref().is_some_and(|v| v != old)
    }

    if differs(&self.confidence_score, &record.confidence_score) {
      return Some("confidence_score");
    }
    if differs(&self.escalation_target, &record.escalation_target) {
      return Some("escalation_target");
    }
    if self.route.is_some() && self.route != record.route {
      return Some("route");
    }
    if differs(&self.is_escalated, &record.is_escalated) {
      return Some("is_escalated");
    }
    if differs(&self.decision_rationale, &record.decision_rationale) {
      return Some("decision_rationale");
    }
    if differs(&self.run_status, &record.run_status) {
      return Some("run_status");
    }
    None
  }
}
