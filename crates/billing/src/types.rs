//! Workspace billing records
//!
//! [`SubscriptionData`] mirrors the provider subscription as last seen. It is
//! treated as an immutable value: edits produce a new snapshot so the copy read
//! from storage is never mutated in place.

use gatekeeper_shared::{BillingInterval, WorkspacePlanName, WorkspacePlanStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Billing tier and status of a workspace (one per workspace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePlan {
    pub workspace_id: Uuid,
    pub name: WorkspacePlanName,
    pub status: WorkspacePlanStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl WorkspacePlan {
    /// Same plan with a different status
    pub fn with_status(&self, status: WorkspacePlanStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Internal mirror of a provider subscription (1:1 with a workspace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSubscription {
    pub workspace_id: Uuid,
    pub subscription_data: SubscriptionData,
    pub billing_interval: BillingInterval,
    #[serde(with = "time::serde::rfc3339")]
    pub current_billing_cycle_end: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl WorkspaceSubscription {
    /// Same subscription carrying a new snapshot, stamped at `updated_at`
    pub fn with_subscription_data(
        &self,
        subscription_data: SubscriptionData,
        updated_at: OffsetDateTime,
    ) -> Self {
        Self {
            subscription_data,
            updated_at,
            ..self.clone()
        }
    }
}

/// Status string reported by the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Trialing,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    /// Anything the provider may add later
    #[serde(other)]
    Unknown,
}

impl ProviderSubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSubscriptionStatus::Active => "active",
            ProviderSubscriptionStatus::PastDue => "past_due",
            ProviderSubscriptionStatus::Canceled => "canceled",
            ProviderSubscriptionStatus::Trialing => "trialing",
            ProviderSubscriptionStatus::Incomplete => "incomplete",
            ProviderSubscriptionStatus::IncompleteExpired => "incomplete_expired",
            ProviderSubscriptionStatus::Unpaid => "unpaid",
            ProviderSubscriptionStatus::Paused => "paused",
            ProviderSubscriptionStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProviderSubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One billable line item of a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionProduct {
    pub product_id: String,
    pub price_id: String,
    pub quantity: u64,
    /// Provider item id; absent for lines not yet pushed to the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_item_id: Option<String>,
}

/// Snapshot of a provider subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionData {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: ProviderSubscriptionStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub cancel_at: Option<OffsetDateTime>,
    pub products: Vec<SubscriptionProduct>,
}

impl SubscriptionData {
    pub fn product(&self, product_id: &str) -> Option<&SubscriptionProduct> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    /// Copy with the quantity of `product_id` replaced.
    ///
    /// Returns `None` if the snapshot has no such product line.
    pub fn with_product_quantity(&self, product_id: &str, quantity: u64) -> Option<Self> {
        self.product(product_id)?;

        let products = self
            .products
            .iter()
            .map(|p| {
                if p.product_id == product_id {
                    SubscriptionProduct {
                        quantity,
                        ..p.clone()
                    }
                } else {
                    p.clone()
                }
            })
            .collect();

        Some(Self {
            products,
            ..self.clone()
        })
    }

    /// Copy with a new product line appended.
    ///
    /// Product ids stay unique: if the line already exists the copy replaces it.
    pub fn with_product(&self, product: SubscriptionProduct) -> Self {
        let mut products: Vec<SubscriptionProduct> = self
            .products
            .iter()
            .filter(|p| p.product_id != product.product_id)
            .cloned()
            .collect();
        products.push(product);

        Self {
            products,
            ..self.clone()
        }
    }
}
