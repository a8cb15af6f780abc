//! Billing errors

use gatekeeper_shared::UncoveredVariant;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Workspace plan not found for workspace: {0}")]
    PlanNotFound(String),

    #[error("Workspace subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// The plan tier cannot be billed through a seat-based subscription
    #[error("Workspace plan {0} is not compatible with subscription billing")]
    PlanMismatch(String),

    /// A value outside a closed enumeration reached billing logic
    #[error("Uncovered {kind} variant: {value}")]
    UncoveredVariant { kind: &'static str, value: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Stripe API error: {0}")]
    StripeApi(String),

    #[error("Webhook signature invalid")]
    WebhookSignatureInvalid,

    #[error("Webhook event not supported: {0}")]
    WebhookEventNotSupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Missing billing state for the referenced workspace or subscription.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::PlanNotFound(_) | BillingError::SubscriptionNotFound(_)
        )
    }
}

impl From<UncoveredVariant> for BillingError {
    fn from(e: UncoveredVariant) -> Self {
        BillingError::UncoveredVariant {
            kind: e.kind,
            value: e.value,
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(e.to_string())
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(e: stripe::StripeError) -> Self {
        BillingError::StripeApi(e.to_string())
    }
}
