//! Stage functions.
//!
//! Each stage reads the current record and returns a [`StageOutput`]: the
//! fields it changes and the audit entry describing what it did. The
//! executor applies the patch; stages never mutate the record themselves.

use langie_ability::{AtlasRequest, CommonRequest};
use langie_workflow::{
  AuditDraft, EntryStatus, RecordPatch, Route, RunStatus, Stage, StructuredData, WorkflowRecord,
};
use serde_json::json;
use tracing::{debug, info};

use crate::calls::StageScope;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::RunNotifier;
use crate::policy;

/// What one stage execution produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
  pub patch: RecordPatch,
  pub draft: AuditDraft,
  /// The run must stop here and wait for the requester.
  pub suspend: bool,
}

impl StageOutput {
  fn new(patch: RecordPatch, draft: AuditDraft) -> Self {
    Self {
      patch,
      draft,
      suspend: false,
    }
  }
}

impl<N: RunNotifier> Engine<N> {
  /// Execute a single stage against a record without persisting anything.
  pub async fn run_stage(
    &self,
    stage: Stage,
    record: &WorkflowRecord,
  ) -> Result<StageOutput, EngineError> {
    debug!(%stage, run_id = %record.run_id, "running stage");
    match stage {
      Stage::Intake => Ok(intake()),
      Stage::Understand => self.understand(record).await,
      Stage::Prepare => self.prepare(record).await,
      Stage::Ask => self.ask(record).await,
      Stage::Wait => self.wait(record).await,
      Stage::Retrieve => self.retrieve(record).await,
      Stage::Decide => self.decide(record).await,
      Stage::EscalateUpdate => self.escalate_update(record).await,
      Stage::Generate => self.generate(record).await,
      Stage::Act => self.act(record).await,
      Stage::Complete => Ok(complete(record)),
    }
  }

  async fn understand(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Understand;
    let mut scope = StageScope::new(stage);

    // Independent calls; results are taken in a fixed order.
    let (parsed, extracted) = tokio::join!(
      self.parse_request_text(stage, &record.query_text),
      self.extract_entities(stage, &record.query_text),
    );
    let parsed = scope.take(parsed?);
    let extracted = scope.take(extracted?);

    let (entities, source) = policy::merge_entities(&parsed, &extracted, &record.query_text);
    let missing = entities.missing();
    debug!(source = source.as_str(), missing = ?missing, "entities merged");
    scope.annotate("entity_source", json!(source.as_str()));

    let patch = RecordPatch {
      structured_data: Some(StructuredData {
        entities,
        customer_answer: record.structured_data.customer_answer.clone(),
      }),
      missing_fields: Some(missing),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn prepare(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Prepare;
    let mut scope = StageScope::new(stage);
    let intake_priority = record.priority.as_str();

    let normalized = self
      .normalize_fields(stage, intake_priority, &record.run_id)
      .await?;
    let normalized = scope.take(normalized);
    let normalized_priority = if normalized.trim().is_empty() {
      intake_priority.to_uppercase()
    } else {
      normalized.trim().to_string()
    };

    let enriched = self
      .enrich_records(stage, &record.run_id, &record.requester_contact)
      .await?;
    let enriched = scope.take(enriched);

    let flags = self
      .add_flags_calculations(stage, &normalized_priority, &record.query_text)
      .await?;
    let mut flags = scope.take(flags);
    flags.sla_risk = Some(policy::sla_risk(
      &record.query_text,
      &normalized_priority,
      flags.sla_risk,
    ));

    let entities = &record.structured_data.entities;
    let normalized_entities = self.entity_normalization(stage, entities).await?;
    let normalized_entities = scope.take(normalized_entities);

    let mut structured_data = record.structured_data.clone();
    if !normalized_entities.is_empty() {
      structured_data.entities = normalized_entities;
    }

    let patch = RecordPatch {
      normalized_priority: Some(normalized_priority),
      enriched_data: Some(enriched),
      flags: Some(flags),
      structured_data: Some(structured_data),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn ask(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Ask;
    if record.missing_fields.is_empty() {
      let draft = AuditDraft::new(stage).skipped("no missing information");
      return Ok(StageOutput::new(RecordPatch::default(), draft));
    }

    let mut scope = StageScope::new(stage);
    let question = self
      .clarify_question(stage, &record.query_text, &record.structured_data)
      .await?;
    let question = scope.take(question);
    let prompt = if question.trim().is_empty() {
      policy::fallback_question(&record.missing_fields)
    } else {
      question.trim().to_string()
    };

    let patch = RecordPatch {
      clarification_prompt: Some(prompt),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn wait(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Wait;
    let reply = record.customer_reply.trim();

    if reply.is_empty() {
      if record.missing_fields.is_empty() {
        let draft = AuditDraft::new(stage).skipped("nothing was asked");
        return Ok(StageOutput::new(RecordPatch::default(), draft));
      }

      info!(run_id = %record.run_id, missing = ?record.missing_fields, "waiting for requester reply");
      let draft = AuditDraft::new(stage)
        .invoked("store_answer", None)
        .status(EntryStatus::AwaitingInput);
      let patch = RecordPatch {
        run_status: Some(RunStatus::AwaitingInput),
        ..Default::default()
      };
      return Ok(StageOutput {
        patch,
        draft,
        suspend: true,
      });
    }

    let mut scope = StageScope::new(stage);
    let answer = self.extract_answer(stage, reply).await?;
    let answer = scope.take(answer);
    scope.internal("store_answer");

    let mut structured_data = record.structured_data.clone();
    structured_data.customer_answer = if answer.trim().is_empty() {
      reply.to_string()
    } else {
      answer.trim().to_string()
    };

    let patch = RecordPatch {
      structured_data: Some(structured_data),
      run_status: Some(RunStatus::InputReceived),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn retrieve(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Retrieve;
    let mut scope = StageScope::new(stage);
    let entities = &record.structured_data.entities;

    let semantic = self
      .generate_semantic_query(stage, &record.query_text, entities)
      .await?;
    let semantic = scope.take(semantic);
    let search_query = if semantic.trim().is_empty() {
      record.query_text.clone()
    } else {
      semantic
    };

    let data = self
      .knowledge_base_search(stage, &search_query, &entities.search_text())
      .await?;
    let data = scope.take(data);
    scope.internal("store_data");

    let retrieved = if data.trim().is_empty() {
      scope.annotate("default_content", json!(true));
      policy::DEFAULT_RETRIEVED_CONTENT.to_string()
    } else {
      data
    };

    let summary = self.summarize_retrieval(stage, &retrieved).await?;
    let summary = scope.take(summary);

    let patch = RecordPatch {
      retrieved_content: Some(retrieved),
      retrieval_summary: Some(summary),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn decide(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Decide;
    let mut scope = StageScope::new(stage);
    let priority = record.effective_priority();

    let raw = self
      .solution_evaluation(stage, &record.query_text, &priority, &record.retrieved_content)
      .await?;
    let score = policy::clamp_score(scope.take(raw));

    let target = self
      .escalation_decision(stage, &record.query_text, score)
      .await?;
    let target = scope.take(target);
    scope.internal("update_payload");

    let route = policy::route_for(score, &record.query_text);
    let is_escalated = route == Route::Escalate;

    let rationale = self.decision_rationale(stage, score, &priority).await?;
    let rationale = scope.take(rationale);
    let reason = if rationale.trim().is_empty() {
      policy::fallback_reason(score, &record.query_text).to_string()
    } else {
      rationale.trim().to_string()
    };

    info!(run_id = %record.run_id, score, %route, is_escalated, "decision made");
    let verdict = if is_escalated {
      "Escalate"
    } else {
      "No escalation required"
    };
    scope.annotate(
      "decision_details",
      json!(format!("Score {score} - {verdict}; reason: {reason}")),
    );

    let patch = RecordPatch {
      confidence_score: Some(score),
      escalation_target: Some(target),
      route: Some(route),
      is_escalated: Some(is_escalated),
      decision_rationale: Some(reason),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn escalate_update(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::EscalateUpdate;
    let mut scope = StageScope::new(stage);

    let updated = self
      .acknowledged(
        stage,
        AtlasRequest::UpdateTicket {
          run_id: record.run_id.clone(),
          status: "in_progress".to_string(),
          priority: record.effective_priority(),
        },
      )
      .await?;
    scope.take(updated);

    let closed = self
      .acknowledged(
        stage,
        AtlasRequest::CloseTicket {
          run_id: record.run_id.clone(),
        },
      )
      .await?;
    scope.take(closed);

    let status = if record.is_escalated {
      RunStatus::Escalated
    } else {
      RunStatus::Resolved
    };

    // A terminal record keeps the status it already has.
    let patch = RecordPatch {
      run_status: (!record.is_terminal()).then_some(status),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn generate(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Generate;
    let mut scope = StageScope::new(stage);

    let request = CommonRequest::ResponseGeneration {
      query: record.query_text.clone(),
      solution: record.retrieved_content.clone(),
      requester_name: record.requester_name.clone(),
      entities: record.structured_data.entities.clone(),
      score: record.confidence_score,
      is_escalated: record.is_escalated,
    };
    let text = self.response_generation(stage, request).await?;
    let text = scope.take(text);

    let summary = if text.trim().is_empty() {
      let name = match record.requester_name.trim() {
        "" => "there",
        name => name,
      };
      format!("Hello {name}, thank you for contacting support. We are looking into your request.")
    } else {
      text.trim().to_string()
    };

    let patch = RecordPatch {
      resolution_summary: Some(summary),
      ..Default::default()
    };
    Ok(StageOutput::new(patch, scope.finish()))
  }

  async fn act(&self, record: &WorkflowRecord) -> Result<StageOutput, EngineError> {
    let stage = Stage::Act;
    let mut scope = StageScope::new(stage);

    let executed = self
      .acknowledged(
        stage,
        AtlasRequest::ExecuteApiCalls {
          run_id: record.run_id.clone(),
          action_type: "standard".to_string(),
        },
      )
      .await?;
    let executed_ability = executed.ability;
    let executed = scope.take(executed);

    let notified = self
      .acknowledged(
        stage,
        AtlasRequest::TriggerNotifications {
          contact: record.requester_contact.clone(),
          notification_type: "update".to_string(),
        },
      )
      .await?;
    let notified_ability = notified.ability;
    let notified = scope.take(notified);

    let actions: Vec<_> = [(executed_ability, executed), (notified_ability, notified)]
      .into_iter()
      .map(|(action, ack)| {
        json!({
          "action": action,
          "status": if ack { "completed" } else { "unacknowledged" },
        })
      })
      .collect();
    scope.annotate("actions", json!(actions));

    Ok(StageOutput::new(RecordPatch::default(), scope.finish()))
  }
}

fn intake() -> StageOutput {
  let draft = AuditDraft::new(Stage::Intake).invoked("accept_payload", None);
  StageOutput::new(RecordPatch::default(), draft)
}

fn complete(record: &WorkflowRecord) -> StageOutput {
  let draft = AuditDraft::new(Stage::Complete).invoked("output_payload", None);
  let patch = RecordPatch {
    run_status: (!record.is_terminal()).then_some(RunStatus::Resolved),
    ..Default::default()
  };
  StageOutput::new(patch, draft)
}
