//! Text templates rendered by the rule-based COMMON provider.

use minijinja::Environment;
use serde::Serialize;

use crate::ability::{CommonAbility, ProviderId};
use crate::error::AbilityError;

pub const RATIONALE: &str = "\
{%- if score < 50 -%}
Low confidence and potential risk → escalate to human operator.
{%- elif score < 80 -%}
Moderate confidence → proceed with operational steps, monitor for follow-up.
{%- else -%}
High confidence → proceed with automated response and close the loop.
{%- endif -%}";

pub const RESPONSE_AUTH: &str = "\
Hello {{ name }}, we understand the urgency with account access. \
Please try re-syncing your authenticator and check spam for codes.\
{% if solution %} {{ solution }}{% endif %} \
{% if escalated %}We've escalated this to a specialist and will update you shortly.\
{% else %}We'll keep an eye on your account and update you shortly.{% endif %}";

pub const RESPONSE_PAYMENT: &str = "\
Hello {{ name }}, we understand the concern about a duplicate charge. \
We've initiated a review and, if confirmed, will process a refund immediately.\
{% if solution %} {{ solution }}{% endif %} \
Please share the last 4 digits of the payment method and the transaction time to speed things up.";

pub const RESPONSE_DELIVERY: &str = "\
Hello {{ name }}, we see the delivery appears delayed. \
We've contacted the courier to expedite and will update you with the latest status.\
{% if solution %} {{ solution }}{% endif %} \
If you can share the order number and carrier, that will help us prioritize.";

pub const RESPONSE_GENERAL: &str = "\
Hello {{ name }}, we've reviewed your request{% if issue %} about {{ issue }}{% endif %} \
and applied the standard resolution.\
{% if solution %} {{ solution }}{% endif %} \
If you need anything else, please reply to this message.";

/// Render one template against a serializable context.
pub fn render<S: Serialize>(
  env: &Environment<'_>,
  ability: CommonAbility,
  template: &str,
  context: S,
) -> Result<String, AbilityError> {
  env
    .render_str(template, context)
    .map(|text| text.trim().to_string())
    .map_err(|e| AbilityError::Failed {
      provider: ProviderId::Common,
      ability: ability.to_string(),
      message: format!("template rendering failed: {e}"),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use minijinja::context;

  #[test]
  fn test_rationale_bands() {
    let env = Environment::new();
    let render_score = |score: u8| {
      render(
        &env,
        CommonAbility::DecisionRationale,
        RATIONALE,
        context! { score => score },
      )
      .unwrap()
    };
    assert!(render_score(42).starts_with("Low confidence"));
    assert!(render_score(50).starts_with("Moderate confidence"));
    assert!(render_score(85).starts_with("High confidence"));
  }

  #[test]
  fn test_general_response_without_solution() {
    let env = Environment::new();
    let text = render(
      &env,
      CommonAbility::ResponseGeneration,
      RESPONSE_GENERAL,
      context! { name => "Ada", issue => "", solution => "" },
    )
    .unwrap();
    assert_eq!(
      text,
      "Hello Ada, we've reviewed your request and applied the standard resolution. If you need anything else, please reply to this message."
    );
  }

  #[test]
  fn test_syntax_error_is_failure() {
    let env = Environment::new();
    let err = render(
      &env,
      CommonAbility::ResponseGeneration,
      "{% if %}",
      context! {},
    )
    .unwrap_err();
    assert!(matches!(err, AbilityError::Failed { .. }));
  }
}
