//! Behavior shared by every checkpoint store.

use langie_config::TicketDef;
use langie_store::{Checkpoint, CheckpointStore, MemoryStore, SqliteStore, StoreError};
use langie_workflow::{AuditDraft, RecordPatch, Route, RunStatus, Stage, WorkflowRecord};

fn record(run_id: &str) -> WorkflowRecord {
  let ticket = TicketDef {
    run_id: run_id.to_string(),
    requester_name: "Ada".to_string(),
    requester_contact: "ada@example.com".to_string(),
    query_text: "I cannot reset my password".to_string(),
    priority: Some("High".to_string()),
  };
  WorkflowRecord::from_intake(&ticket).unwrap()
}

/// A record suspended at WAIT with a prompt and a few audit entries.
fn suspended(run_id: &str) -> Checkpoint {
  let mut record = record(run_id)
    .apply(RecordPatch {
      clarification_prompt: Some("Which component is affected?".to_string()),
      missing_fields: Some(["affected_component".to_string()].into()),
      run_status: Some(RunStatus::AwaitingInput),
      ..Default::default()
    })
    .unwrap();
  for stage in [Stage::Intake, Stage::Understand, Stage::Prepare, Stage::Ask] {
    record.audit_trail.append(AuditDraft::new(stage));
  }
  Checkpoint::new(record, Some(Stage::Wait))
}

async fn sqlite() -> SqliteStore {
  SqliteStore::in_memory().await.unwrap()
}

async fn check_save_and_load(store: &dyn CheckpointStore) {
  let checkpoint = suspended("TCK-1");
  store.save(&checkpoint).await.unwrap();

  let loaded = store.load("TCK-1").await.unwrap();
  assert_eq!(loaded.record, checkpoint.record);
  assert_eq!(loaded.next_stage, Some(Stage::Wait));
  assert_eq!(loaded.revision, 1);
  assert!(loaded.is_suspended());

  let next = loaded.advance(loaded.record.clone(), Some(Stage::Retrieve));
  store.save(&next).await.unwrap();
  let reloaded = store.load("TCK-1").await.unwrap();
  assert_eq!(reloaded.revision, 2);
  assert_eq!(reloaded.next_stage, Some(Stage::Retrieve));
}

async fn check_not_found(store: &dyn CheckpointStore) {
  assert!(matches!(
    store.load("missing").await,
    Err(StoreError::NotFound(id)) if id == "missing"
  ));
  assert!(matches!(
    store
      .merge_and_resume("missing", &RecordPatch::reply("x"))
      .await,
    Err(StoreError::NotFound(_))
  ));
  assert!(!store.delete("missing").await.unwrap());
}

async fn check_merge_changes_only_reply(store: &dyn CheckpointStore) {
  let checkpoint = suspended("TCK-2");
  store.save(&checkpoint).await.unwrap();
  let before = store.load("TCK-2").await.unwrap();

  let merged = store
    .merge_and_resume("TCK-2", &RecordPatch::reply("X"))
    .await
    .unwrap();
  let after = store.load("TCK-2").await.unwrap();

  assert_eq!(merged.record, after.record);
  assert_eq!(after.revision, before.revision);
  assert_eq!(after.next_stage, before.next_stage);

  let mut expected = before.record.clone();
  expected.customer_reply = "X".to_string();
  assert_eq!(after.record, expected);
  assert_eq!(after.record.audit_trail.len(), 4);
}

async fn check_merge_requires_suspended(store: &dyn CheckpointStore) {
  let record = record("TCK-3")
    .apply(RecordPatch {
      route: Some(Route::Respond),
      run_status: Some(RunStatus::Resolved),
      ..Default::default()
    })
    .unwrap();
  store.save(&Checkpoint::new(record, None)).await.unwrap();

  let err = store
    .merge_and_resume("TCK-3", &RecordPatch::reply("late"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    StoreError::NotSuspended {
      run_status: RunStatus::Resolved,
      next_stage: None,
      ..
    }
  ));
  assert_eq!(store.load("TCK-3").await.unwrap().record.customer_reply, "");
}

async fn check_merge_claims_suspended_run(store: &dyn CheckpointStore) {
  store.save(&suspended("TCK-4")).await.unwrap();
  let claim = RecordPatch {
    run_status: Some(RunStatus::InputReceived),
    ..RecordPatch::reply("first")
  };

  store.merge_and_resume("TCK-4", &claim).await.unwrap();
  let err = store
    .merge_and_resume("TCK-4", &RecordPatch::reply("second"))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    StoreError::NotSuspended {
      run_status: RunStatus::InputReceived,
      next_stage: Some(Stage::Wait),
      ..
    }
  ));
  assert_eq!(store.load("TCK-4").await.unwrap().record.customer_reply, "first");
}

async fn check_create_rejects_existing(store: &dyn CheckpointStore) {
  let checkpoint = Checkpoint::new(record("TCK-5"), Some(Stage::Intake));
  store.create(&checkpoint).await.unwrap();

  let mut other = Checkpoint::new(record("TCK-5"), Some(Stage::Understand));
  other.record.requester_name = "Grace".to_string();
  assert!(matches!(
    store.create(&other).await,
    Err(StoreError::AlreadyExists(id)) if id == "TCK-5"
  ));

  let loaded = store.load("TCK-5").await.unwrap();
  assert_eq!(loaded.next_stage, Some(Stage::Intake));
  assert_eq!(loaded.record.requester_name, "Ada");
}

async fn check_list_and_delete(store: &dyn CheckpointStore) {
  store.save(&suspended("TCK-A")).await.unwrap();
  store.save(&suspended("TCK-B")).await.unwrap();

  let listed = store.list().await.unwrap();
  assert_eq!(listed.len(), 2);
  assert!(listed.iter().all(|s| s.run_status == RunStatus::AwaitingInput));
  assert!(listed.iter().all(|s| s.next_stage == Some(Stage::Wait)));

  assert!(store.delete("TCK-A").await.unwrap());
  assert!(!store.delete("TCK-A").await.unwrap());
  let listed = store.list().await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].run_id, "TCK-B");
}

#[tokio::test]
async fn test_memory_save_and_load() {
  check_save_and_load(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_save_and_load() {
  check_save_and_load(&sqlite().await).await;
}

#[tokio::test]
async fn test_memory_not_found() {
  check_not_found(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_not_found() {
  check_not_found(&sqlite().await).await;
}

#[tokio::test]
async fn test_memory_merge_changes_only_reply() {
  check_merge_changes_only_reply(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_merge_changes_only_reply() {
  check_merge_changes_only_reply(&sqlite().await).await;
}

#[tokio::test]
async fn test_memory_merge_requires_suspended() {
  check_merge_requires_suspended(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_merge_requires_suspended() {
  check_merge_requires_suspended(&sqlite().await).await;
}

#[tokio::test]
async fn test_memory_merge_claims_suspended_run() {
  check_merge_claims_suspended_run(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_merge_claims_suspended_run() {
  check_merge_claims_suspended_run(&sqlite().await).await;
}

#[tokio::test]
async fn test_memory_create_rejects_existing() {
  check_create_rejects_existing(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_create_rejects_existing() {
  check_create_rejects_existing(&sqlite().await).await;
}

#[tokio::test]
async fn test_sqlite_concurrent_create_admits_one() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("checkpoints.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  let checkpoint = Checkpoint::new(record("TCK-6"), Some(Stage::Intake));

  let (first, second) = tokio::join!(a.create(&checkpoint), b.create(&checkpoint));
  let created = [&first, &second].iter().filter(|r| r.is_ok()).count();
  assert_eq!(created, 1);
  assert!(
    [first, second]
      .into_iter()
      .any(|r| matches!(r, Err(StoreError::AlreadyExists(_))))
  );
}

#[tokio::test]
async fn test_memory_list_and_delete() {
  check_list_and_delete(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_list_and_delete() {
  check_list_and_delete(&sqlite().await).await;
}

#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("checkpoints.db");

  {
    let store = SqliteStore::open(&path).await.unwrap();
    store.save(&suspended("TCK-F")).await.unwrap();
  }

  let store = SqliteStore::open(&path).await.unwrap();
  let loaded = store.load("TCK-F").await.unwrap();
  assert_eq!(loaded.record.clarification_prompt, "Which component is affected?");
}
