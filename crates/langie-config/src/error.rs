/// Errors raised while parsing configuration input.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// A priority string did not name one of the known levels.
  #[error("invalid priority '{0}': expected one of Low, Medium, High, Critical")]
  InvalidPriority(String),

  /// The JSON document could not be parsed.
  #[error("invalid {what} document: {source}")]
  Json {
    what: &'static str,
    #[source]
    source: serde_json::Error,
  },
}
