use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enums::{BranchPolicy, FallbackPolicy};
use crate::error::ConfigError;

/// Engine-level settings.
///
/// Every field has a default, so an empty JSON object is a valid settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  pub branch_policy: BranchPolicy,
  pub fallback_policy: FallbackPolicy,
  pub provider: ProviderPolicy,
  /// Knowledge base file consulted by the rule-based knowledge search.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub knowledge_base: Option<PathBuf>,
}

impl EngineSettings {
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Json {
      what: "settings",
      source,
    })
  }
}

/// Per-call policy applied by the provider adapter, never by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderPolicy {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_retry_attempts: Option<u32>,
  pub retry_backoff_ms: u64,
}

impl Default for ProviderPolicy {
  fn default() -> Self {
    Self {
      timeout_ms: None,
      max_retry_attempts: None,
      retry_backoff_ms: 200,
    }
  }
}
