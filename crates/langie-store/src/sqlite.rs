use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use langie_workflow::{RecordPatch, RunStatus, Stage, WorkflowRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use crate::{Checkpoint, CheckpointStore, CheckpointSummary, StoreError};

/// SQLite-based checkpoint store.
pub struct SqliteStore {
  pool: SqlitePool,
}

#[derive(FromRow)]
struct CheckpointRow {
  run_id: String,
  next_stage: Option<String>,
  record: Json<WorkflowRecord>,
  revision: i64,
  updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SummaryRow {
  run_id: String,
  run_status: String,
  next_stage: Option<String>,
  revision: i64,
  updated_at: DateTime<Utc>,
}

fn parse_stage(run_id: &str, stage: Option<String>) -> Result<Option<Stage>, StoreError> {
  stage
    .map(|s| s.parse::<Stage>())
    .transpose()
    .map_err(|e| StoreError::Corrupt {
      run_id: run_id.to_string(),
      message: e.to_string(),
    })
}

fn not_suspended(checkpoint: Checkpoint) -> StoreError {
  StoreError::NotSuspended {
    run_id: checkpoint.run_id,
    run_status: checkpoint.record.run_status,
    next_stage: checkpoint.next_stage,
  }
}

impl CheckpointRow {
  fn into_checkpoint(self) -> Result<Checkpoint, StoreError> {
    let next_stage = parse_stage(&self.run_id, self.next_stage)?;
    Ok(Checkpoint {
      run_id: self.run_id,
      next_stage,
      record: self.record.0,
      revision: self.revision,
      updated_at: self.updated_at,
    })
  }
}

impl SummaryRow {
  fn into_summary(self) -> Result<CheckpointSummary, StoreError> {
    let next_stage = parse_stage(&self.run_id, self.next_stage)?;
    let run_status: RunStatus =
      serde_json::from_value(serde_json::Value::String(self.run_status)).map_err(|e| {
        StoreError::Corrupt {
          run_id: self.run_id.clone(),
          message: e.to_string(),
        }
      })?;
    Ok(CheckpointSummary {
      run_id: self.run_id,
      run_status,
      next_stage,
      revision: self.revision,
      updated_at: self.updated_at,
    })
  }
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) a database file and run migrations.
  pub async fn open(path: &Path) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A private in-memory database. One connection, so every query sees the
  /// same database.
  pub async fn in_memory() -> Result<Self, StoreError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
  async fn create(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            INSERT INTO checkpoints (run_id, next_stage, run_status, record, revision, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&checkpoint.run_id)
    .bind(checkpoint.next_stage.map(|s| s.as_str()))
    .bind(checkpoint.record.run_status.as_str())
    .bind(Json(&checkpoint.record))
    .bind(checkpoint.revision)
    .bind(checkpoint.updated_at)
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        Err(StoreError::AlreadyExists(checkpoint.run_id.clone()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
    sqlx::query(
      r#"
            INSERT INTO checkpoints (run_id, next_stage, run_status, record, revision, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (run_id) DO UPDATE SET
              next_stage = excluded.next_stage,
              run_status = excluded.run_status,
              record = excluded.record,
              revision = excluded.revision,
              updated_at = excluded.updated_at
            "#,
    )
    .bind(&checkpoint.run_id)
    .bind(checkpoint.next_stage.map(|s| s.as_str()))
    .bind(checkpoint.record.run_status.as_str())
    .bind(Json(&checkpoint.record))
    .bind(checkpoint.revision)
    .bind(checkpoint.updated_at)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn load(&self, run_id: &str) -> Result<Checkpoint, StoreError> {
    let row: Option<CheckpointRow> = sqlx::query_as(
      r#"
            SELECT run_id, next_stage, record, revision, updated_at
            FROM checkpoints
            WHERE run_id = ?
            "#,
    )
    .bind(run_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?
      .into_checkpoint()
  }

  async fn merge_and_resume(
    &self,
    run_id: &str,
    patch: &RecordPatch,
  ) -> Result<Checkpoint, StoreError> {
    let stored = self.load(run_id).await?;
    if !stored.is_suspended() {
      return Err(not_suspended(stored));
    }

    let mut checkpoint = stored.clone();
    checkpoint.record = checkpoint.record.apply(patch.clone())?;
    checkpoint.updated_at = Utc::now();

    // Compare-and-swap on the suspended state and the timestamp read above;
    // a concurrent merge or save makes this match no rows.
    let result = sqlx::query(
      r#"
            UPDATE checkpoints
            SET record = ?, run_status = ?, updated_at = ?
            WHERE run_id = ? AND next_stage = ? AND run_status = ? AND updated_at = ?
            "#,
    )
    .bind(Json(&checkpoint.record))
    .bind(checkpoint.record.run_status.as_str())
    .bind(checkpoint.updated_at)
    .bind(run_id)
    .bind(Stage::Wait.as_str())
    .bind(RunStatus::AwaitingInput.as_str())
    .bind(stored.updated_at)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(not_suspended(self.load(run_id).await?));
    }
    Ok(checkpoint)
  }

  async fn delete(&self, run_id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query("DELETE FROM checkpoints WHERE run_id = ?")
      .bind(run_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
    let rows: Vec<SummaryRow> = sqlx::query_as(
      r#"
            SELECT run_id, run_status, next_stage, revision, updated_at
            FROM checkpoints
            ORDER BY updated_at DESC, run_id ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    rows.into_iter().map(SummaryRow::into_summary).collect()
  }
}
