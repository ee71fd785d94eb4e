//! Langie Ability
//!
//! The boundary between the executor and the two ability providers.
//!
//! Each provider is a trait with a single `invoke` method taking a tagged
//! request enum and returning a tagged response enum, so every ability a
//! stage can call is known at compile time:
//!
//! - [`CommonProvider`] (provider A): text parsing, normalization, scoring,
//!   summarization and response generation
//! - [`AtlasProvider`] (provider B): entity extraction, enrichment,
//!   clarification, knowledge search, ticketing and notifications
//!
//! Backends live behind these traits. [`RuleCommonProvider`] and
//! [`RuleAtlasProvider`] are deterministic keyword-rule backends;
//! [`ResilientProvider`] adds timeouts and retries around any backend.

mod ability;
mod atlas;
mod common;
mod error;
mod keywords;
mod knowledge;
mod resilient;
mod rules;
mod templates;

pub use ability::{AtlasAbility, CommonAbility, ProviderId};
pub use atlas::{AtlasProvider, AtlasRequest, AtlasResponse};
pub use common::{CommonProvider, CommonRequest, CommonResponse};
pub use error::AbilityError;
pub use knowledge::KnowledgeBase;
pub use resilient::ResilientProvider;
pub use rules::{RuleAtlasProvider, RuleCommonProvider};

/// Merge an ability tag into a JSON object of request fields.
fn tagged(ability: &str, fields: serde_json::Value) -> Result<serde_json::Value, String> {
  let mut object = match fields {
    serde_json::Value::Object(map) => map,
    serde_json::Value::Null => serde_json::Map::new(),
    other => return Err(format!("request fields must be a JSON object, got {other}")),
  };
  object.insert(
    "ability".to_string(),
    serde_json::Value::String(ability.to_string()),
  );
  Ok(serde_json::Value::Object(object))
}
