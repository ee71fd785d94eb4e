use thiserror::Error;

use crate::ability::ProviderId;

/// Errors that can occur while invoking an ability.
#[derive(Debug, Clone, Error)]
pub enum AbilityError {
  /// The provider does not expose an ability with this name.
  #[error("unknown {provider} ability: {ability}")]
  UnknownAbility { provider: ProviderId, ability: String },

  /// The request fields could not be read for the ability.
  #[error("invalid request for {provider} ability '{ability}': {message}")]
  InvalidRequest {
    provider: ProviderId,
    ability: String,
    message: String,
  },

  /// The backend could not be reached.
  #[error("{provider} unavailable while invoking '{ability}': {message}")]
  Unavailable {
    provider: ProviderId,
    ability: String,
    message: String,
  },

  /// The backend did not answer in time.
  #[error("{provider} ability '{ability}' timed out after {timeout_ms}ms")]
  Timeout {
    provider: ProviderId,
    ability: String,
    timeout_ms: u64,
  },

  /// The backend answered with an error.
  #[error("{provider} ability '{ability}' failed: {message}")]
  Failed {
    provider: ProviderId,
    ability: String,
    message: String,
  },

  /// The backend answered for a different ability than the one invoked.
  #[error("{provider} returned a '{actual}' response to a '{expected}' request")]
  UnexpectedResponse {
    provider: ProviderId,
    expected: String,
    actual: String,
  },
}

impl AbilityError {
  /// The ability the error is about, as it was requested.
  pub fn ability(&self) -> &str {
    match self {
      AbilityError::UnknownAbility { ability, .. }
      | AbilityError::InvalidRequest { ability, .. }
      | AbilityError::Unavailable { ability, .. }
      | AbilityError::Timeout { ability, .. }
      | AbilityError::Failed { ability, .. } => ability,
      AbilityError::UnexpectedResponse { expected, .. } => expected,
    }
  }

  pub fn provider(&self) -> ProviderId {
    match self {
      AbilityError::UnknownAbility { provider, .. }
      | AbilityError::InvalidRequest { provider, .. }
      | AbilityError::Unavailable { provider, .. }
      | AbilityError::Timeout { provider, .. }
      | AbilityError::Failed { provider, .. }
      | AbilityError::UnexpectedResponse { provider, .. } => *provider,
    }
  }

  /// Errors worth another attempt against the same backend.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      AbilityError::Unavailable { .. } | AbilityError::Timeout { .. }
    )
  }

  /// Errors a caller may paper over with a neutral response. Contract
  /// violations (unknown ability, malformed request or response) never are.
  pub fn is_recoverable(&self) -> bool {
    matches!(
      self,
      AbilityError::Unavailable { .. } | AbilityError::Timeout { .. } | AbilityError::Failed { .. }
    )
  }
}
