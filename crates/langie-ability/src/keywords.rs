//! Keyword cues shared by the rule-based providers.

pub const AUTH_KEYWORDS: &[&str] = &["2fa", "auth", "code", "password", "reset"];
pub const PAYMENT_KEYWORDS: &[&str] = &["payment", "charge", "billing", "invoice"];
pub const DELIVERY_KEYWORDS: &[&str] = &[
  "delivery",
  "delivered",
  "shipping",
  "shipment",
  "courier",
  "carrier",
  "tracking",
  "in transit",
];

pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
  keywords.iter().any(|k| text.contains(k))
}

pub fn count_hits(text: &str, keywords: &[&str]) -> usize {
  keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Support domain a request most likely belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
  Auth,
  Payment,
  Delivery,
  General,
}

impl Domain {
  /// First matching domain in precedence order: account access, then
  /// payment, then delivery. Expects lower-cased text.
  pub fn detect(text: &str) -> Self {
    if contains_any(text, AUTH_KEYWORDS) {
      Domain::Auth
    } else if contains_any(text, PAYMENT_KEYWORDS) {
      Domain::Payment
    } else if contains_any(text, DELIVERY_KEYWORDS) {
      Domain::Delivery
    } else {
      Domain::General
    }
  }

  /// Domain with the most keyword hits. Account access wins ties with
  /// payment; delivery needs a strict majority. Expects lower-cased text.
  pub fn dominant(text: &str) -> Self {
    let auth = count_hits(text, AUTH_KEYWORDS);
    let payment = count_hits(text, PAYMENT_KEYWORDS);
    let delivery = count_hits(text, DELIVERY_KEYWORDS);
    if auth + payment + delivery == 0 {
      Domain::General
    } else if delivery > auth.max(payment) {
      Domain::Delivery
    } else if auth >= payment {
      Domain::Auth
    } else {
      Domain::Payment
    }
  }
}
