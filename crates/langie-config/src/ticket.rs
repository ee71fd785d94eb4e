use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Intake payload for one support request.
///
/// Fields are all optional at the serde level so that a missing field shows
/// up as a validation error naming the field, rather than a parse error.
/// The legacy ticket field names are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketDef {
  #[serde(default, alias = "ticket_id")]
  pub run_id: String,
  #[serde(default, alias = "customer_name")]
  pub requester_name: String,
  #[serde(default, alias = "email")]
  pub requester_contact: String,
  #[serde(default, alias = "query")]
  pub query_text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<String>,
}

impl TicketDef {
  /// Parse an intake document from JSON.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Json {
      what: "ticket",
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ticket_canonical_names() {
    let json = r#"{
      "run_id": "R-1",
      "requester_name": "Ada",
      "requester_contact": "ada@example.com",
      "query_text": "cannot log in",
      "priority": "High"
    }"#;

    let ticket = TicketDef::from_json(json).unwrap();
    assert_eq!(ticket.run_id, "R-1");
    assert_eq!(ticket.requester_name, "Ada");
    assert_eq!(ticket.priority.as_deref(), Some("High"));
  }

  #[test]
  fn test_ticket_legacy_names() {
    let json = r#"{
      "ticket_id": "TCK12345",
      "customer_name": "Akshay",
      "email": "akshay@example.com",
      "query": "reset link broken",
      "priority": "Critical"
    }"#;

    let ticket = TicketDef::from_json(json).unwrap();
    assert_eq!(ticket.run_id, "TCK12345");
    assert_eq!(ticket.requester_contact, "akshay@example.com");
    assert_eq!(ticket.query_text, "reset link broken");
  }

  #[test]
  fn test_ticket_missing_fields_parse_as_empty() {
    let ticket = TicketDef::from_json(r#"{ "query": "help" }"#).unwrap();
    assert!(ticket.run_id.is_empty());
    assert!(ticket.priority.is_none());
  }

  #[test]
  fn test_ticket_invalid_json() {
    let err = TicketDef::from_json("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Json { what: "ticket", .. }));
  }
}
