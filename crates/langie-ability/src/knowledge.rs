//! Tag-scored article lookup backing `knowledge_base_search`.

use langie_config::{ArticleDef, KnowledgeBaseDef};

use crate::keywords::{Domain, contains_any};

const AUTH_ONLY_TAGS: &[&str] = &["password", "reset", "link"];

/// Articles searched by the rule-based ATLAS provider.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
  articles: Vec<ArticleDef>,
}

impl KnowledgeBase {
  pub fn new(def: KnowledgeBaseDef) -> Self {
    let articles = def
      .articles
      .into_iter()
      .map(|mut article| {
        article.tags = article
          .tags
          .into_iter()
          .map(|t| t.trim().to_lowercase())
          .filter(|t| !t.is_empty())
          .collect();
        article
      })
      .collect();
    Self { articles }
  }

  /// A small set of articles covering the domains the rule providers know.
  pub fn builtin() -> Self {
    let article = |id: &str, title: &str, tags: &[&str], content: &str| ArticleDef {
      id: Some(id.to_string()),
      title: Some(title.to_string()),
      tags: tags.iter().map(|t| t.to_string()).collect(),
      content: content.to_string(),
    };

    Self::new(KnowledgeBaseDef {
      articles: vec![
        article(
          "kb-password-reset",
          "Password reset",
          &["password", "reset", "link", "login"],
          "To reset your password, use the latest reset link; if it fails, request a new link.",
        ),
        article(
          "kb-2fa",
          "Two-factor codes",
          &["2fa", "authenticator", "code", "auth"],
          "If 2FA codes are not arriving, resync the authenticator app clock and check spam for fallback codes.",
        ),
        article(
          "kb-duplicate-charge",
          "Duplicate charges",
          &["payment", "charge", "billing", "invoice", "refund", "duplicate"],
          "Duplicate charges are reviewed within 24 hours; confirmed duplicates are refunded to the original payment method.",
        ),
        article(
          "kb-delayed-delivery",
          "Delayed delivery",
          &["delivery", "shipping", "shipment", "courier", "tracking"],
          "Delayed deliveries can be expedited with the courier using the tracking number; status updates follow within one business day.",
        ),
      ],
    })
  }

  pub fn len(&self) -> usize {
    self.articles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.articles.is_empty()
  }

  /// Best article for a query: the one whose tags appear most often in the
  /// query text or the entity `context`. Ties keep the earlier article; no
  /// hits means no article.
  ///
  /// Delivery questions never match articles tagged for account recovery,
  /// which share words like "link" with shipping notices.
  pub fn search(&self, query: &str, context: &str) -> Option<&ArticleDef> {
    let text = format!("{query} {context}").to_lowercase();
    let domain = Domain::detect(&text);

    let mut best: Option<(usize, &ArticleDef)> = None;
    for article in &self.articles {
      if domain == Domain::Delivery && article.tags.iter().any(|t| contains_any(t, AUTH_ONLY_TAGS)) {
        continue;
      }
      let hits = article.tags.iter().filter(|t| text.contains(t.as_str())).count();
      if hits == 0 {
        continue;
      }
      if best.is_none_or(|(score, _)| hits > score) {
        best = Some((hits, article));
      }
    }
    best.map(|(_, article)| article)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_password_reset() {
    let kb = KnowledgeBase::builtin();
    let article = kb.search("I cannot reset my password", "").unwrap();
    assert_eq!(article.id.as_deref(), Some("kb-password-reset"));
  }

  #[test]
  fn test_best_score_wins() {
    let kb = KnowledgeBase::builtin();
    let article = kb
      .search("I was charged twice, duplicate payment on my invoice", "")
      .unwrap();
    assert_eq!(article.id.as_deref(), Some("kb-duplicate-charge"));
  }

  #[test]
  fn test_delivery_skips_account_articles() {
    let kb = KnowledgeBase::new(KnowledgeBaseDef {
      articles: vec![
        ArticleDef {
          id: Some("reset".to_string()),
          title: None,
          tags: vec!["link".to_string()],
          content: "reset link".to_string(),
        },
        ArticleDef {
          id: Some("ship".to_string()),
          title: None,
          tags: vec!["TRACKING ".to_string()],
          content: "tracking help".to_string(),
        },
      ],
    });
    let article = kb
      .search("the tracking link for my delivery is broken", "")
      .unwrap();
    assert_eq!(article.id.as_deref(), Some("ship"));
  }

  #[test]
  fn test_no_hits() {
    assert!(KnowledgeBase::builtin().search("hello there", "").is_none());
    assert!(KnowledgeBase::default().search("password", "").is_none());
  }

  #[test]
  fn test_entity_context_contributes_hits() {
    let kb = KnowledgeBase::builtin();
    assert!(kb.search("it stopped working yesterday", "").is_none());

    let article = kb
      .search("it stopped working yesterday", "authentication 2fa")
      .unwrap();
    assert_eq!(article.id.as_deref(), Some("kb-2fa"));
  }
}
