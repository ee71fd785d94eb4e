//! Timeout and retry at the provider adapter boundary.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use langie_config::ProviderPolicy;
use tracing::warn;

use crate::ability::ProviderId;
use crate::atlas::{AtlasProvider, AtlasRequest, AtlasResponse};
use crate::common::{CommonProvider, CommonRequest, CommonResponse};
use crate::error::AbilityError;

/// Wraps a provider with a per-call timeout and bounded retries.
///
/// Only [`AbilityError::is_retryable`] errors are retried, starting
/// `retry_backoff_ms` apart and doubling. Everything else is returned on the
/// first occurrence.
pub struct ResilientProvider<P> {
  inner: P,
  policy: ProviderPolicy,
}

impl<P> ResilientProvider<P> {
  pub fn new(inner: P, policy: ProviderPolicy) -> Self {
    Self { inner, policy }
  }

  fn backoff(&self) -> ExponentialBuilder {
    let retries = self.policy.max_retry_attempts.unwrap_or(0);
    ExponentialBuilder::default()
      .with_min_delay(Duration::from_millis(self.policy.retry_backoff_ms))
      .with_max_times(retries as usize)
  }

  /// One attempt, bounded by the policy timeout.
  async fn attempt<T>(
    &self,
    provider: ProviderId,
    ability: &str,
    call: impl Future<Output = Result<T, AbilityError>>,
  ) -> Result<T, AbilityError> {
    let Some(timeout_ms) = self.policy.timeout_ms else {
      return call.await;
    };
    tokio::time::timeout(Duration::from_millis(timeout_ms), call)
      .await
      .unwrap_or_else(|_| {
        Err(AbilityError::Timeout {
          provider,
          ability: ability.to_string(),
          timeout_ms,
        })
      })
  }

  async fn call<T, F, Fut>(
    &self,
    provider: ProviderId,
    ability: &str,
    mut invoke: F,
  ) -> Result<T, AbilityError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AbilityError>>,
  {
    (|| self.attempt(provider, ability, invoke()))
      .retry(self.backoff())
      .when(AbilityError::is_retryable)
      .notify(|err: &AbilityError, dur: Duration| {
        warn!(
          %provider,
          ability,
          backoff_ms = dur.as_millis() as u64,
          error = %err,
          "ability call failed, retrying"
        );
      })
      .await
  }
}

#[async_trait]
impl<P: CommonProvider> CommonProvider for ResilientProvider<P> {
  async fn invoke(&self, request: CommonRequest) -> Result<CommonResponse, AbilityError> {
    let ability = request.ability();
    self
      .call(ProviderId::Common, ability.as_str(), || {
        self.inner.invoke(request.clone())
      })
      .await
  }
}

#[async_trait]
impl<P: AtlasProvider> AtlasProvider for ResilientProvider<P> {
  async fn invoke(&self, request: AtlasRequest) -> Result<AtlasResponse, AbilityError> {
    let ability = request.ability();
    self
      .call(ProviderId::Atlas, ability.as_str(), || {
        self.inner.invoke(request.clone())
      })
      .await
  }
}
