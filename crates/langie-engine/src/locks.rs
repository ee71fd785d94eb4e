//! Per-run mutual exclusion.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes `start`/`resume` calls that target the same run id.
///
/// Different run ids never contend beyond the brief map lookup.
#[derive(Clone, Default)]
pub struct RunLocks {
  locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl RunLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for exclusive access to a run. Access lasts as long as the guard.
  pub async fn acquire(&self, run_id: &str) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().await;
      // Entries only the map references are idle.
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks
        .entry(run_id.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
    };
    lock.lock_owned().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_same_run_is_exclusive() {
    let locks = RunLocks::new();
    let guard = locks.acquire("TCK-1").await;

    let contender = {
      let locks = locks.clone();
      tokio::spawn(async move {
        let _guard = locks.acquire("TCK-1").await;
      })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished());

    drop(guard);
    contender.await.unwrap();
  }

  #[tokio::test]
  async fn test_distinct_runs_do_not_block() {
    let locks = RunLocks::new();
    let _a = locks.acquire("TCK-1").await;
    let _b = locks.acquire("TCK-2").await;
    assert_eq!(locks.locks.lock().await.len(), 2);
  }

  #[tokio::test]
  async fn test_released_locks_are_pruned() {
    let locks = RunLocks::new();
    drop(locks.acquire("TCK-1").await);
    let _b = locks.acquire("TCK-2").await;
    let held: Vec<_> = locks.locks.lock().await.keys().cloned().collect();
    assert_eq!(held, vec!["TCK-2".to_string()]);
  }
}
