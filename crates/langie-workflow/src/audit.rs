use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// How a stage execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
  Completed,
  Skipped,
  AwaitingInput,
}

/// One immutable record of a stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub stage: Stage,
  pub timestamp: DateTime<Utc>,
  pub abilities: Vec<String>,
  pub providers: Vec<String>,
  pub status: EntryStatus,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub annotations: serde_json::Map<String, serde_json::Value>,
}

/// An audit entry under construction. Stages build one of these; the
/// ledger stamps it when it is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
  stage: Stage,
  abilities: Vec<String>,
  providers: Vec<String>,
  status: EntryStatus,
  annotations: serde_json::Map<String, serde_json::Value>,
}

impl AuditDraft {
  pub fn new(stage: Stage) -> Self {
    Self {
      stage,
      abilities: Vec::new(),
      providers: Vec::new(),
      status: EntryStatus::Completed,
      annotations: serde_json::Map::new(),
    }
  }

  pub fn stage(&self) -> Stage {
    self.stage
  }

  /// Record an ability invocation. Internal abilities pass no provider.
  pub fn invoked(mut self, ability: impl Into<String>, provider: Option<&str>) -> Self {
    self.abilities.push(ability.into());
    if let Some(p) = provider.map(str::trim).filter(|p| !p.is_empty()) {
      self.providers.push(p.to_string());
    }
    self
  }

  /// Mark the stage as skipped. A skip records the reason instead of
  /// abilities.
  pub fn skipped(mut self, reason: impl Into<String>) -> Self {
    self.status = EntryStatus::Skipped;
    self.abilities.clear();
    self.providers.clear();
    self
      .annotations
      .insert("reason".to_string(), serde_json::Value::String(reason.into()));
    self
  }

  pub fn status(mut self, status: EntryStatus) -> Self {
    self.status = status;
    self
  }

  pub fn annotate(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.annotations.insert(key.into(), value);
    self
  }
}

/// Append-only, time-ordered trail of stage executions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLedger {
  entries: Vec<AuditEntry>,
}

impl AuditLedger {
  /// Minimum gap between consecutive entries.
  pub fn tick() -> Duration {
    Duration::milliseconds(1)
  }

  pub fn append(&mut self, draft: AuditDraft) -> &AuditEntry {
    self.append_at(draft, Utc::now())
  }

  /// Append with an explicit clock reading. If `now` does not move past the
  /// previous entry, the entry is stamped one tick after it so timestamps
  /// stay strictly increasing.
  pub fn append_at(&mut self, draft: AuditDraft, now: DateTime<Utc>) -> &AuditEntry {
    let timestamp = match self.entries.last() {
      Some(last) if now <= last.timestamp => last.timestamp + Self::tick(),
      _ => now,
    };
    let index = self.entries.len();
    self.entries.push(AuditEntry {
      stage: draft.stage,
      timestamp,
      abilities: draft.abilities,
      providers: draft.providers,
      status: draft.status,
      annotations: draft.annotations,
    });
    &self.entries[index]
  }

  pub fn entries(&self) -> &[AuditEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn last(&self) -> Option<&AuditEntry> {
    self.entries.last()
  }

  pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> {
    self.entries.iter()
  }
}
