use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use langie_workflow::RecordPatch;
use tokio::sync::RwLock;

use crate::{Checkpoint, CheckpointStore, CheckpointSummary, StoreError};

/// In-process checkpoint store. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
  checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
  async fn create(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    let mut checkpoints = self.checkpoints.write().await;
    if checkpoints.contains_key(&checkpoint.run_id) {
      return Err(StoreError::AlreadyExists(checkpoint.run_id.clone()));
    }
    checkpoints.insert(checkpoint.run_id.clone(), checkpoint.clone());
    Ok(())
  }

  async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    let mut checkpoints = self.checkpoints.write().await;
    checkpoints.insert(checkpoint.run_id.clone(), checkpoint.clone());
    Ok(())
  }

  async fn load(&self, run_id: &str) -> Result<Checkpoint, StoreError> {
    let checkpoints = self.checkpoints.read().await;
    checkpoints
      .get(run_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
  }

  async fn merge_and_resume(
    &self,
    run_id: &str,
    patch: &RecordPatch,
  ) -> Result<Checkpoint, StoreError> {
    // Held across read-modify-write so writers to the same key serialize.
    let mut checkpoints = self.checkpoints.write().await;
    let checkpoint = checkpoints
      .get_mut(run_id)
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
    if !checkpoint.is_suspended() {
      return Err(StoreError::NotSuspended {
        run_id: run_id.to_string(),
        run_status: checkpoint.record.run_status,
        next_stage: checkpoint.next_stage,
      });
    }

    checkpoint.record = checkpoint.record.clone().apply(patch.clone())?;
    checkpoint.updated_at = Utc::now();
    Ok(checkpoint.clone())
  }

  async fn delete(&self, run_id: &str) -> Result<bool, StoreError> {
    let mut checkpoints = self.checkpoints.write().await;
    Ok(checkpoints.remove(run_id).is_some())
  }

  async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
    let checkpoints = self.checkpoints.read().await;
    let mut summaries: Vec<_> = checkpoints.values().map(Checkpoint::summary).collect();
    summaries.sort_by(|a, b| {
      b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| a.run_id.cmp(&b.run_id))
    });
    Ok(summaries)
  }
}
