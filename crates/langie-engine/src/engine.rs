//! The stage graph executor.
//!
//! The `Engine` drives a run through the stage graph one stage at a time,
//! persisting a checkpoint at every stage boundary. A run either finishes at
//! COMPLETE, suspends at WAIT waiting for the requester, or fails with the
//! stage and ability that broke it.

use std::sync::Arc;

use langie_ability::{AtlasProvider, CommonProvider};
use langie_config::{BranchPolicy, EngineSettings, FallbackPolicy, TicketDef};
use langie_store::{Checkpoint, CheckpointStore, CheckpointSummary, StoreError};
use langie_workflow::{RecordPatch, RunStatus, Stage, StageGraph, WorkflowRecord};
use tracing::{error, info, instrument, warn};

use crate::error::EngineError;
use crate::events::{NoopNotifier, RunEvent, RunNotifier};
use crate::locks::RunLocks;

/// Policies the executor applies to every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
  pub branch_policy: BranchPolicy,
  pub fallback_policy: FallbackPolicy,
}

impl From<&EngineSettings> for EngineConfig {
  fn from(settings: &EngineSettings) -> Self {
    Self {
      branch_policy: settings.branch_policy,
      fallback_policy: settings.fallback_policy,
    }
  }
}

/// How an invocation handed control back.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  /// The run reached COMPLETE.
  Finished(WorkflowRecord),
  /// The run is waiting at WAIT; the record carries the clarification prompt.
  Suspended(WorkflowRecord),
}

impl RunOutcome {
  pub fn record(&self) -> &WorkflowRecord {
    match self {
      RunOutcome::Finished(record) | RunOutcome::Suspended(record) => record,
    }
  }

  pub fn into_record(self) -> WorkflowRecord {
    match self {
      RunOutcome::Finished(record) | RunOutcome::Suspended(record) => record,
    }
  }

  pub fn is_suspended(&self) -> bool {
    matches!(self, RunOutcome::Suspended(_))
  }
}

/// The support workflow engine.
///
/// Generic over `N: RunNotifier` to allow different notification strategies.
/// Use `Engine::new()` for an engine with no-op notifications, or
/// `Engine::with_notifier()` to observe runs.
pub struct Engine<N: RunNotifier = NoopNotifier> {
  pub(crate) common: Arc<dyn CommonProvider>,
  pub(crate) atlas: Arc<dyn AtlasProvider>,
  pub(crate) config: EngineConfig,
  store: Arc<dyn CheckpointStore>,
  graph: StageGraph,
  notifier: N,
  locks: RunLocks,
}

impl Engine<NoopNotifier> {
  /// Create an engine whose events are discarded.
  pub fn new(
    config: EngineConfig,
    common: Arc<dyn CommonProvider>,
    atlas: Arc<dyn AtlasProvider>,
    store: Arc<dyn CheckpointStore>,
  ) -> Self {
    Self::with_notifier(config, common, atlas, store, NoopNotifier)
  }
}

impl<N: RunNotifier> Engine<N> {
  /// Create an engine with a custom notifier.
  pub fn with_notifier(
    config: EngineConfig,
    common: Arc<dyn CommonProvider>,
    atlas: Arc<dyn AtlasProvider>,
    store: Arc<dyn CheckpointStore>,
    notifier: N,
  ) -> Self {
    Self {
      common,
      atlas,
      config,
      store,
      graph: StageGraph::new(config.branch_policy),
      notifier,
      locks: RunLocks::new(),
    }
  }

  pub fn config(&self) -> EngineConfig {
    self.config
  }

  pub fn graph(&self) -> &StageGraph {
    &self.graph
  }

  /// Start a new run from an intake.
  ///
  /// Fails without touching the store if the intake lacks a run id, query
  /// text or priority, and with [`EngineError::RunExists`] if the run id is
  /// already taken.
  pub async fn start(&self, ticket: &TicketDef) -> Result<RunOutcome, EngineError> {
    let record = WorkflowRecord::from_intake(ticket).map_err(EngineError::Intake)?;
    let run_id = record.run_id.clone();
    let invocation_id = uuid::Uuid::new_v4().to_string();

    let _guard = self.locks.acquire(&run_id).await;
    let checkpoint = Checkpoint::new(record, Some(self.graph.entry_point()));
    match self.store.create(&checkpoint).await {
      Ok(()) => {}
      Err(StoreError::AlreadyExists(_)) => {
        warn!(%run_id, "run already exists");
        return Err(EngineError::RunExists(run_id));
      }
      Err(e) => return Err(e.into()),
    }

    self.notifier.notify(RunEvent::RunStarted {
      invocation_id: invocation_id.clone(),
      run_id,
    });

    self.drive(&invocation_id, checkpoint).await
  }

  /// Resume a run suspended at WAIT with the requester's reply.
  ///
  /// The trimmed reply is merged into the stored record together with the
  /// `input_received` status, in one conditional store write; of several
  /// concurrent resumes only one gets past it. Execution continues from
  /// WAIT, and a blank reply suspends the run again.
  pub async fn resume(&self, run_id: &str, reply: &str) -> Result<RunOutcome, EngineError> {
    let invocation_id = uuid::Uuid::new_v4().to_string();
    let _guard = self.locks.acquire(run_id).await;

    let patch = RecordPatch {
      run_status: Some(RunStatus::InputReceived),
      ..RecordPatch::reply(reply.trim())
    };
    let checkpoint = match self.store.merge_and_resume(run_id, &patch).await {
      Ok(checkpoint) => checkpoint,
      Err(StoreError::NotSuspended {
        run_id,
        run_status,
        next_stage,
      }) => {
        return Err(EngineError::NotResumable {
          run_id,
          status: run_status,
          next_stage: next_stage
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string()),
        });
      }
      Err(e) => return Err(e.into()),
    };

    self.notifier.notify(RunEvent::RunResumed {
      invocation_id: invocation_id.clone(),
      run_id: run_id.to_string(),
    });

    self.drive(&invocation_id, checkpoint).await
  }

  /// The stored checkpoint for a run.
  pub async fn inspect(&self, run_id: &str) -> Result<Checkpoint, EngineError> {
    Ok(self.store.load(run_id).await?)
  }

  pub async fn list(&self) -> Result<Vec<CheckpointSummary>, EngineError> {
    Ok(self.store.list().await?)
  }

  /// Drop a run's checkpoint. The executor itself never deletes.
  pub async fn delete(&self, run_id: &str) -> Result<bool, EngineError> {
    let _guard = self.locks.acquire(run_id).await;
    Ok(self.store.delete(run_id).await?)
  }

  /// Run stages from the checkpoint's continuation until the run finishes
  /// or suspends.
  #[instrument(
    name = "run",
    skip(self, invocation_id, checkpoint),
    fields(
      run_id = %checkpoint.run_id,
      invocation_id = %invocation_id,
    )
  )]
  async fn drive(
    &self,
    invocation_id: &str,
    checkpoint: Checkpoint,
  ) -> Result<RunOutcome, EngineError> {
    let run_id = checkpoint.run_id.clone();
    let result = self.drive_inner(invocation_id, checkpoint).await;

    match &result {
      Ok(RunOutcome::Finished(record)) => {
        info!(status = %record.run_status, stages = record.audit_trail.len(), "run completed");
        self.notifier.notify(RunEvent::RunCompleted {
          invocation_id: invocation_id.to_string(),
          run_id,
          status: record.run_status,
        });
      }
      Ok(RunOutcome::Suspended(record)) => {
        info!(prompt = %record.clarification_prompt, "run suspended awaiting input");
        self.notifier.notify(RunEvent::RunSuspended {
          invocation_id: invocation_id.to_string(),
          run_id,
          prompt: record.clarification_prompt.clone(),
        });
      }
      Err(e) => {
        error!(error = %e, stage = ?e.stage(), ability = ?e.ability(), "run failed");
        self.notifier.notify(RunEvent::RunFailed {
          invocation_id: invocation_id.to_string(),
          run_id,
          stage: e.stage(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  async fn drive_inner(
    &self,
    invocation_id: &str,
    mut checkpoint: Checkpoint,
  ) -> Result<RunOutcome, EngineError> {
    let mut record = checkpoint.record.clone();
    let mut current = checkpoint.next_stage;

    while let Some(stage) = current {
      self.notifier.notify(RunEvent::StageStarted {
        invocation_id: invocation_id.to_string(),
        run_id: checkpoint.run_id.clone(),
        stage,
      });

      let output = self.run_stage(stage, &record).await?;
      let suspend = output.suspend;

      record = record
        .apply(output.patch)
        .map_err(|source| EngineError::Record { stage, source })?;
      let status = record.audit_trail.append(output.draft).status;

      let next = if suspend {
        Some(Stage::Wait)
      } else {
        self
          .graph
          .next(stage, record.route)
          .map_err(|source| EngineError::Record { stage, source })?
      };

      checkpoint = checkpoint.advance(record.clone(), next);
      self.store.save(&checkpoint).await?;

      self.notifier.notify(RunEvent::StageCompleted {
        invocation_id: invocation_id.to_string(),
        run_id: checkpoint.run_id.clone(),
        stage,
        status,
      });

      if suspend {
        return Ok(RunOutcome::Suspended(record));
      }
      current = next;
    }

    Ok(RunOutcome::Finished(record))
  }
}
