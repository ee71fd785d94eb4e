//! Typed ability calls.
//!
//! Every provider call made by a stage goes through `call_common` or
//! `call_atlas`, which apply the fallback policy and check that the response
//! answers the ability that was asked.

use langie_ability::{
  AbilityError, AtlasRequest, AtlasResponse, CommonRequest, CommonResponse, ProviderId,
};
use langie_config::FallbackPolicy;
use langie_workflow::{AuditDraft, Entities, Flags, Stage, StructuredData};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::RunNotifier;

/// The value of one ability call along with what the audit trail needs.
#[derive(Debug, Clone)]
pub(crate) struct Called<T> {
  pub value: T,
  pub ability: &'static str,
  pub provider: ProviderId,
  /// The neutral response was substituted for a failed call.
  pub fallback: bool,
}

/// Collects the audit draft of a stage while its calls are made.
pub(crate) struct StageScope {
  draft: AuditDraft,
  fallbacks: Vec<String>,
}

impl StageScope {
  pub fn new(stage: Stage) -> Self {
    Self {
      draft: AuditDraft::new(stage),
      fallbacks: Vec::new(),
    }
  }

  /// Record a provider call and hand back its value.
  pub fn take<T>(&mut self, called: Called<T>) -> T {
    self.edit(|d| d.invoked(called.ability, Some(called.provider.as_str())));
    if called.fallback {
      self.fallbacks.push(called.ability.to_string());
    }
    called.value
  }

  /// Record an ability the executor performs itself.
  pub fn internal(&mut self, ability: &str) {
    self.edit(|d| d.invoked(ability, None));
  }

  pub fn annotate(&mut self, key: &str, value: serde_json::Value) {
    self.edit(|d| d.annotate(key, value));
  }

  pub fn edit(&mut self, f: impl FnOnce(AuditDraft) -> AuditDraft) {
    let stage = self.draft.stage();
    let draft = std::mem::replace(&mut self.draft, AuditDraft::new(stage));
    self.draft = f(draft);
  }

  pub fn finish(self) -> AuditDraft {
    if self.fallbacks.is_empty() {
      self.draft
    } else {
      self.draft.annotate("fallbacks", serde_json::json!(self.fallbacks))
    }
  }
}

impl<N: RunNotifier> Engine<N> {
  /// Decide what a failed call turns into.
  fn recover(&self, stage: Stage, error: AbilityError) -> Result<(), EngineError> {
    if error.is_recoverable() && self.config.fallback_policy == FallbackPolicy::Neutral {
      warn!(%stage, ability = error.ability(), error = %error, "ability failed, using neutral response");
      Ok(())
    } else {
      Err(EngineError::Stage {
        stage,
        ability: error.ability().to_string(),
        source: error,
      })
    }
  }

  pub(crate) async fn call_common<T>(
    &self,
    stage: Stage,
    request: CommonRequest,
    extract: impl FnOnce(CommonResponse) -> Result<T, CommonResponse>,
  ) -> Result<Called<T>, EngineError> {
    let ability = request.ability();
    debug!(%stage, %ability, "invoking COMMON ability");

    let (response, fallback) = match self.common.invoke(request).await {
      Ok(response) => (response, false),
      Err(e) => {
        self.recover(stage, e)?;
        (CommonResponse::neutral(ability), true)
      }
    };

    let value = extract(response).map_err(|other| EngineError::Stage {
      stage,
      ability: ability.to_string(),
      source: other.mismatch(ability),
    })?;

    Ok(Called {
      value,
      ability: ability.as_str(),
      provider: ProviderId::Common,
      fallback,
    })
  }

  pub(crate) async fn call_atlas<T>(
    &self,
    stage: Stage,
    request: AtlasRequest,
    extract: impl FnOnce(AtlasResponse) -> Result<T, AtlasResponse>,
  ) -> Result<Called<T>, EngineError> {
    let ability = request.ability();
    debug!(%stage, %ability, "invoking ATLAS ability");

    let (response, fallback) = match self.atlas.invoke(request).await {
      Ok(response) => (response, false),
      Err(e) => {
        self.recover(stage, e)?;
        (AtlasResponse::neutral(ability), true)
      }
    };

    let value = extract(response).map_err(|other| EngineError::Stage {
      stage,
      ability: ability.to_string(),
      source: other.mismatch(ability),
    })?;

    Ok(Called {
      value,
      ability: ability.as_str(),
      provider: ProviderId::Atlas,
      fallback,
    })
  }

  pub(crate) async fn parse_request_text(
    &self,
    stage: Stage,
    query: &str,
  ) -> Result<Called<Entities>, EngineError> {
    let request = CommonRequest::ParseRequestText {
      query: query.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::ParseRequestText(entities) => Ok(entities),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn normalize_fields(
    &self,
    stage: Stage,
    priority: &str,
    run_id: &str,
  ) -> Result<Called<String>, EngineError> {
    let request = CommonRequest::NormalizeFields {
      priority: priority.to_string(),
      run_id: run_id.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::NormalizeFields { priority } => Ok(priority),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn add_flags_calculations(
    &self,
    stage: Stage,
    priority: &str,
    query: &str,
  ) -> Result<Called<Flags>, EngineError> {
    let request = CommonRequest::AddFlagsCalculations {
      priority: priority.to_string(),
      query: query.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::AddFlagsCalculations(flags) => Ok(flags),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn entity_normalization(
    &self,
    stage: Stage,
    entities: &Entities,
  ) -> Result<Called<Entities>, EngineError> {
    let request = CommonRequest::EntityNormalization {
      entities: entities.clone(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::EntityNormalization { entities } => Ok(entities),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn generate_semantic_query(
    &self,
    stage: Stage,
    query: &str,
    entities: &Entities,
  ) -> Result<Called<String>, EngineError> {
    let request = CommonRequest::GenerateSemanticQuery {
      query: query.to_string(),
      entities: entities.clone(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::GenerateSemanticQuery { semantic_query } => Ok(semantic_query),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn summarize_retrieval(
    &self,
    stage: Stage,
    retrieved: &str,
  ) -> Result<Called<String>, EngineError> {
    let request = CommonRequest::SummarizeRetrieval {
      retrieved: retrieved.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::SummarizeRetrieval(summary) => Ok(summary),
        other => Err(other),
      })
      .await
  }

  /// Returns the raw score; DECIDE clamps it.
  pub(crate) async fn solution_evaluation(
    &self,
    stage: Stage,
    query: &str,
    priority: &str,
    retrieved: &str,
  ) -> Result<Called<i64>, EngineError> {
    let request = CommonRequest::SolutionEvaluation {
      query: query.to_string(),
      priority: priority.to_string(),
      retrieved: retrieved.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::SolutionEvaluation { score, .. } => Ok(score),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn decision_rationale(
    &self,
    stage: Stage,
    score: u8,
    priority: &str,
  ) -> Result<Called<String>, EngineError> {
    let request = CommonRequest::DecisionRationale {
      score,
      priority: priority.to_string(),
    };
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::DecisionRationale(reason) => Ok(reason),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn response_generation(
    &self,
    stage: Stage,
    request: CommonRequest,
  ) -> Result<Called<String>, EngineError> {
    self
      .call_common(stage, request, |r| match r {
        CommonResponse::ResponseGeneration(text) => Ok(text),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn extract_entities(
    &self,
    stage: Stage,
    query: &str,
  ) -> Result<Called<Entities>, EngineError> {
    let request = AtlasRequest::ExtractEntities {
      query: query.to_string(),
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::ExtractEntities { entities } => Ok(entities),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn enrich_records(
    &self,
    stage: Stage,
    run_id: &str,
    contact: &str,
  ) -> Result<Called<serde_json::Map<String, serde_json::Value>>, EngineError> {
    let request = AtlasRequest::EnrichRecords {
      run_id: run_id.to_string(),
      contact: contact.to_string(),
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::EnrichRecords(data) => Ok(data),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn clarify_question(
    &self,
    stage: Stage,
    query: &str,
    structured_data: &StructuredData,
  ) -> Result<Called<String>, EngineError> {
    let request = AtlasRequest::ClarifyQuestion {
      query: query.to_string(),
      structured_data: structured_data.clone(),
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::ClarifyQuestion { question } => Ok(question),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn extract_answer(
    &self,
    stage: Stage,
    reply: &str,
  ) -> Result<Called<String>, EngineError> {
    let request = AtlasRequest::ExtractAnswer {
      reply: reply.to_string(),
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::ExtractAnswer { answer } => Ok(answer),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn knowledge_base_search(
    &self,
    stage: Stage,
    query: &str,
    context: &str,
  ) -> Result<Called<String>, EngineError> {
    let request = AtlasRequest::KnowledgeBaseSearch {
      query: query.to_string(),
      context: context.to_string(),
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::KnowledgeBaseSearch { data } => Ok(data),
        other => Err(other),
      })
      .await
  }

  pub(crate) async fn escalation_decision(
    &self,
    stage: Stage,
    query: &str,
    score: u8,
  ) -> Result<Called<String>, EngineError> {
    let request = AtlasRequest::EscalationDecision {
      query: query.to_string(),
      score,
    };
    self
      .call_atlas(stage, request, |r| match r {
        AtlasResponse::EscalationDecision(target) => Ok(target),
        other => Err(other),
      })
      .await
  }

  /// Ticket and notification abilities, answered with an acknowledgement.
  pub(crate) async fn acknowledged(
    &self,
    stage: Stage,
    request: AtlasRequest,
  ) -> Result<Called<bool>, EngineError> {
    let ability = request.ability();
    self
      .call_atlas(stage, request, |r| match r.ack() {
        Some(ack) if r.ability() == ability => Ok(ack),
        _ => Err(r),
      })
      .await
  }
}
