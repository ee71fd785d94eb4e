//! Pure decision rules used by the stage functions.

use langie_workflow::{Entities, Route, SlaRisk};

/// Substituted when knowledge search finds nothing, so later stages always
/// have content to work with.
pub const DEFAULT_RETRIEVED_CONTENT: &str =
  "To reset your password, use the latest reset link; if it fails, request a new link.";

const AUTH_CUES: &[&str] = &["2fa", "auth", "code", "password", "reset"];

/// Where the merged understanding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitySource {
  Atlas,
  Common,
  Inferred,
  None,
}

impl EntitySource {
  pub fn as_str(&self) -> &'static str {
    match self {
      EntitySource::Atlas => "atlas",
      EntitySource::Common => "common",
      EntitySource::Inferred => "inferred",
      EntitySource::None => "none",
    }
  }
}

/// Merge the two extraction results.
///
/// ATLAS wins when it found an issue type, with the parsed fields filling
/// its gaps. Otherwise the parsed fields lead and ATLAS fills gaps. When
/// both come back empty the query text is searched for keywords.
pub fn merge_entities(parsed: &Entities, extracted: &Entities, query: &str) -> (Entities, EntitySource) {
  if !extracted.issue_type.trim().is_empty() {
    let mut merged = parsed.clone();
    merged.overlay(extracted);
    return (merged, EntitySource::Atlas);
  }

  let mut merged = parsed.clone();
  merged.fill_gaps(extracted);
  if !merged.is_empty() {
    return (merged, EntitySource::Common);
  }

  match infer_entities(query) {
    Some(inferred) => (inferred, EntitySource::Inferred),
    None => (Entities::default(), EntitySource::None),
  }
}

/// Keyword inference for requests neither provider understood.
pub fn infer_entities(query: &str) -> Option<Entities> {
  let q = query.to_lowercase();
  let (issue_type, product) = if q.contains("password") || q.contains("reset") {
    ("Password Reset", "User Account")
  } else if q.contains("software") {
    ("General Issue", "Software")
  } else {
    return None;
  };

  let mut entities = Entities {
    issue_type: issue_type.to_string(),
    ..Default::default()
  };
  entities.extra.insert(
    "product".to_string(),
    serde_json::Value::String(product.to_string()),
  );
  Some(entities)
}

/// SLA risk after preparation: critical requests are always high risk.
pub fn sla_risk(query: &str, normalized_priority: &str, computed: Option<SlaRisk>) -> SlaRisk {
  if query.to_lowercase().contains("critical") || normalized_priority.eq_ignore_ascii_case("critical")
  {
    SlaRisk::High
  } else {
    computed.unwrap_or_default()
  }
}

/// An unresolved critical authentication problem.
pub fn is_critical_auth(query: &str) -> bool {
  let q = query.to_lowercase();
  q.contains("critical") && AUTH_CUES.iter().any(|cue| q.contains(cue))
}

/// Clamp a raw provider score into 0..=100.
pub fn clamp_score(raw: i64) -> u8 {
  raw.clamp(0, 100) as u8
}

/// Route selected by DECIDE.
pub fn route_for(score: u8, query: &str) -> Route {
  if is_critical_auth(query) {
    return Route::Escalate;
  }
  match score {
    0..50 => Route::Escalate,
    50..80 => Route::Act,
    80..95 => Route::Respond,
    _ => Route::Act,
  }
}

/// Reason used when the rationale ability returns nothing. Names the band
/// (or override) that [`route_for`] picked for the same inputs.
pub fn fallback_reason(score: u8, query: &str) -> &'static str {
  if is_critical_auth(query) {
    return "Critical authentication issue → escalate";
  }
  match score {
    0..50 => "Score < 50 → escalate",
    50..80 => "50 ≤ score < 80 → perform actions",
    80..95 => "80 ≤ score < 95 → generate response",
    _ => "Score ≥ 95 → perform actions",
  }
}

/// Question used when the clarification ability returns nothing.
pub fn fallback_question<'a>(missing: impl IntoIterator<Item = &'a String>) -> String {
  let fields: Vec<&str> = missing.into_iter().map(String::as_str).collect();
  format!("Could you provide more details for: {}?", fields.join(", "))
}
