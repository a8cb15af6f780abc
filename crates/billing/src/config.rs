//! Billing configuration from the environment

use crate::catalog::{required_env, PriceCatalog};
use crate::error::BillingResult;

/// Stripe credentials
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

impl StripeConfig {
    /// Reads `STRIPE_SECRET_KEY` and `STRIPE_WEBHOOK_SECRET`
    pub fn from_env() -> BillingResult<Self> {
        Ok(Self {
            secret_key: required_env("STRIPE_SECRET_KEY")?,
            webhook_secret: required_env("STRIPE_WEBHOOK_SECRET")?,
        })
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .finish()
    }
}

/// Everything billing needs from the environment
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub stripe: StripeConfig,
    pub catalog: PriceCatalog,
}

impl BillingConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> BillingResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            stripe: StripeConfig::from_env()?,
            catalog: PriceCatalog::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_456".to_string(),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk_test_123"));
        assert!(!debug.contains("whsec_456"));
    }
}
