use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A knowledge base file: a flat list of tagged articles.
///
/// ```json
/// {
///   "articles": [
///     { "id": "kb-1", "title": "Password reset", "tags": ["password", "reset"], "content": "..." }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseDef {
  #[serde(default)]
  pub articles: Vec<ArticleDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default)]
  pub tags: Vec<String>,
  pub content: String,
}

impl KnowledgeBaseDef {
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    serde_json::from_str(content).map_err(|source| ConfigError::Json {
      what: "knowledge base",
      source,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_knowledge_base_parse() {
    let json = r#"{
      "articles": [
        { "id": "kb-1", "tags": ["password", "reset"], "content": "Use the latest link." },
        { "content": "Untagged article." }
      ]
    }"#;

    let kb = KnowledgeBaseDef::from_json(json).unwrap();
    assert_eq!(kb.articles.len(), 2);
    assert_eq!(kb.articles[0].tags, vec!["password", "reset"]);
    assert!(kb.articles[1].tags.is_empty());
    assert!(kb.articles[1].title.is_none());
  }

  #[test]
  fn test_knowledge_base_empty_document() {
    let kb = KnowledgeBaseDef::from_json("{}").unwrap();
    assert!(kb.articles.is_empty());
  }
}
