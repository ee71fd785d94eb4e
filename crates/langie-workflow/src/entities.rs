use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Entity keys that must be present before the run can proceed without
/// asking the requester for clarification.
pub const REQUIRED_ENTITY_FIELDS: [&str; 2] = ["issue_type", "affected_component"];

/// Entities extracted from the request text.
///
/// The well-known fields are typed; anything else a provider returns is kept
/// in `extra`. Deserialization is lenient: `null` reads as empty and a bare
/// string is accepted where a list of descriptions is expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "String::is_empty")]
  pub issue_type: String,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "String::is_empty")]
  pub affected_component: String,
  #[serde(default, deserialize_with = "string_or_seq", skip_serializing_if = "Vec::is_empty")]
  pub problem_description: Vec<String>,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "String::is_empty")]
  pub request_type: String,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

impl Entities {
  pub fn is_empty(&self) -> bool {
    self.issue_type.is_empty()
      && self.affected_component.is_empty()
      && self.problem_description.is_empty()
      && self.request_type.is_empty()
      && self.extra.values().all(is_blank)
  }

  /// Look up a field by key, returning it only when it carries a value.
  pub fn field(&self, key: &str) -> Option<String> {
    let value = match key {
      "issue_type" => self.issue_type.clone(),
      "affected_component" => self.affected_component.clone(),
      "request_type" => self.request_type.clone(),
      "problem_description" => self.problem_description.join("; "),
      _ => match self.extra.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(v) if !is_blank(v) => v.to_string(),
        _ => String::new(),
      },
    };
    (!value.trim().is_empty()).then_some(value)
  }

  /// Required keys that carry no value.
  pub fn missing(&self) -> BTreeSet<String> {
    REQUIRED_ENTITY_FIELDS
      .iter()
      .filter(|key| self.field(key).is_none())
      .map(|key| key.to_string())
      .collect()
  }

  /// Copy every non-empty field of `other` over `self`.
  pub fn overlay(&mut self, other: &Entities) {
    if !other.issue_type.is_empty() {
      self.issue_type = other.issue_type.clone();
    }
    if !other.affected_component.is_empty() {
      self.affected_component = other.affected_component.clone();
    }
    if !other.problem_description.is_empty() {
      self.problem_description = other.problem_description.clone();
    }
    if !other.request_type.is_empty() {
      self.request_type = other.request_type.clone();
    }
    for (key, value) in &other.extra {
      if !is_blank(value) {
        self.extra.insert(key.clone(), value.clone());
      }
    }
  }

  /// Copy fields of `other` only where `self` has nothing.
  pub fn fill_gaps(&mut self, other: &Entities) {
    let mut merged = other.clone();
    merged.overlay(self);
    *self = merged;
  }

  /// Lower-cased text of every string-valued field, for keyword matching.
  pub fn search_text(&self) -> String {
    let mut parts = vec![
      self.issue_type.to_lowercase(),
      self.affected_component.to_lowercase(),
      self.request_type.to_lowercase(),
    ];
    parts.extend(self.problem_description.iter().map(|d| d.to_lowercase()));
    parts.extend(
      self
        .extra
        .values()
        .filter_map(|v| v.as_str())
        .map(|s| s.to_lowercase()),
    );
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
  }
}

/// Structured understanding of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
  #[serde(default)]
  pub entities: Entities,
  /// Answer extracted from the requester's clarification reply.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub customer_answer: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaRisk {
  #[default]
  Low,
  High,
}

impl SlaRisk {
  pub fn as_str(&self) -> &'static str {
    match self {
      SlaRisk::Low => "low",
      SlaRisk::High => "high",
    }
  }
}

/// Flags computed while preparing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flags {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sla_risk: Option<SlaRisk>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    _ => false,
  }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => s,
    Value::Null => String::new(),
    other => other.to_string(),
  })
}

fn string_or_seq<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
  Ok(match Value::deserialize(deserializer)? {
    Value::Array(items) => items
      .into_iter()
      .filter(|v| !is_blank(v))
      .map(|v| match v {
        Value::String(s) => s,
        other => other.to_string(),
      })
      .collect(),
    Value::String(s) if !s.trim().is_empty() => vec![s],
    _ => Vec::new(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_lenient_deserialization() {
    let entities: Entities = serde_json::from_value(json!({
      "issue_type": "Authentication",
      "affected_component": null,
      "problem_description": "codes not arriving",
      "document": "invoice"
    }))
    .unwrap();

    assert_eq!(entities.issue_type, "Authentication");
    assert!(entities.affected_component.is_empty());
    assert_eq!(entities.problem_description, vec!["codes not arriving"]);
    assert_eq!(entities.field("document").as_deref(), Some("invoice"));
  }

  #[test]
  fn test_missing_required_fields() {
    let entities = Entities {
      issue_type: "Password Reset".to_string(),
      ..Default::default()
    };
    let missing = entities.missing();
    assert_eq!(missing.len(), 1);
    assert!(missing.contains("affected_component"));

    assert_eq!(Entities::default().missing().len(), 2);
  }

  #[test]
  fn test_overlay_and_fill_gaps() {
    let mut base = Entities {
      issue_type: "authentication".to_string(),
      request_type: "access".to_string(),
      ..Default::default()
    };
    let other = Entities {
      issue_type: "Authentication".to_string(),
      affected_component: "2FA".to_string(),
      ..Default::default()
    };

    let mut overlaid = base.clone();
    overlaid.overlay(&other);
    assert_eq!(overlaid.issue_type, "Authentication");
    assert_eq!(overlaid.affected_component, "2FA");
    assert_eq!(overlaid.request_type, "access");

    base.fill_gaps(&other);
    assert_eq!(base.issue_type, "authentication");
    assert_eq!(base.affected_component, "2FA");
  }

  #[test]
  fn test_search_text_joins_string_fields() {
    let entities: Entities = serde_json::from_value(json!({
      "issue_type": "Billing",
      "affected_component": "",
      "problem_description": ["Charged TWICE"],
      "product": "Pro Plan",
      "count": 2
    }))
    .unwrap();
    assert_eq!(entities.search_text(), "billing charged twice pro plan");
    assert_eq!(Entities::default().search_text(), "");
  }

  #[test]
  fn test_blank_extra_counts_as_empty() {
    let entities: Entities = serde_json::from_value(json!({ "product": "" })).unwrap();
    assert!(entities.is_empty());
  }

  #[test]
  fn test_flags_keep_extra_fields() {
    let flags: Flags =
      serde_json::from_value(json!({ "sla_risk": "high", "requires_human": true })).unwrap();
    assert_eq!(flags.sla_risk, Some(SlaRisk::High));
    assert_eq!(flags.extra["requires_human"], json!(true));
  }
}
