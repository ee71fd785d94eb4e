use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Priority of a support request.
///
/// Parsing is case-insensitive so intake files can say `"high"` or `"HIGH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
  Low,
  Medium,
  High,
  Critical,
}

impl Priority {
  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::Low => "Low",
      Priority::Medium => "Medium",
      Priority::High => "High",
      Priority::Critical => "Critical",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Priority {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "low" => Ok(Priority::Low),
      "medium" => Ok(Priority::Medium),
      "high" => Ok(Priority::High),
      "critical" => Ok(Priority::Critical),
      _ => Err(ConfigError::InvalidPriority(s.to_string())),
    }
  }
}

impl TryFrom<String> for Priority {
  type Error = ConfigError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Priority> for String {
  fn from(value: Priority) -> Self {
    value.as_str().to_string()
  }
}

/// How the executor treats the stages downstream of DECIDE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
  /// Run escalation update, response generation and action execution in
  /// sequence regardless of the computed route.
  #[default]
  TraverseAll,
  /// Run only the branch selected by the computed route.
  RouteOnly,
}

/// What happens when a provider call fails with a recoverable error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
  /// Abort the stage, and with it the run.
  #[default]
  FailFast,
  /// Substitute the ability's neutral response and annotate the audit entry.
  Neutral,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_priority_parse_is_case_insensitive() {
    assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
    assert_eq!(" CRITICAL ".parse::<Priority>().unwrap(), Priority::Critical);
    assert_eq!("Low".parse::<Priority>().unwrap(), Priority::Low);
  }

  #[test]
  fn test_priority_parse_rejects_unknown() {
    let err = "urgent".parse::<Priority>().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPriority(p) if p == "urgent"));
  }

  #[test]
  fn test_priority_serde() {
    let p: Priority = serde_json::from_str("\"medium\"").unwrap();
    assert_eq!(p, Priority::Medium);
    assert_eq!(serde_json::to_string(&p).unwrap(), "\"Medium\"");
  }

  #[test]
  fn test_policies_default() {
    assert_eq!(BranchPolicy::default(), BranchPolicy::TraverseAll);
    assert_eq!(FallbackPolicy::default(), FallbackPolicy::FailFast);

    let policy: BranchPolicy = serde_json::from_str("\"route_only\"").unwrap();
    assert_eq!(policy, BranchPolicy::RouteOnly);
  }
}
