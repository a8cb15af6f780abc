//! Stripe subscription client
//!
//! Pushes product-line snapshots to Stripe and turns Stripe subscription
//! objects back into snapshots.

use async_trait::async_trait;
use stripe::generated::billing::subscription::SubscriptionProrationBehavior;
use stripe::{
    Client, Expandable, Subscription, SubscriptionId, SubscriptionStatus as StripeSubStatus,
    UpdateSubscription, UpdateSubscriptionItems,
};
use time::OffsetDateTime;

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::store::SubscriptionDataReconciler;
use crate::types::{ProviderSubscriptionStatus, SubscriptionData, SubscriptionProduct};

/// A live subscription item as Stripe reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingItem {
    pub item_id: String,
    pub product_id: String,
}

/// One entry of the `items` list sent with a subscription update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemUpdate {
    Update {
        item_id: String,
        price_id: String,
        quantity: u64,
    },
    Create {
        price_id: String,
        quantity: u64,
    },
    Delete {
        item_id: String,
    },
}

/// Item changes that make Stripe match `products`.
///
/// Existing items are matched by product id. Snapshot lines without an item
/// are created; items whose product left the snapshot are deleted.
pub fn plan_item_updates(
    existing: &[ExistingItem],
    products: &[SubscriptionProduct],
) -> Vec<ItemUpdate> {
    let mut updates: Vec<ItemUpdate> = products
        .iter()
        .map(|product| {
            match existing.iter().find(|item| item.product_id == product.product_id) {
                Some(item) => ItemUpdate::Update {
                    item_id: item.item_id.clone(),
                    price_id: product.price_id.clone(),
                    quantity: product.quantity,
                },
                None => ItemUpdate::Create {
                    price_id: product.price_id.clone(),
                    quantity: product.quantity,
                },
            }
        })
        .collect();

    updates.extend(
        existing
            .iter()
            .filter(|item| !products.iter().any(|p| p.product_id == item.product_id))
            .map(|item| ItemUpdate::Delete {
                item_id: item.item_id.clone(),
            }),
    );

    updates
}

impl From<ItemUpdate> for UpdateSubscriptionItems {
    fn from(update: ItemUpdate) -> Self {
        match update {
            ItemUpdate::Update {
                item_id,
                price_id,
                quantity,
            } => UpdateSubscriptionItems {
                id: Some(item_id),
                price: Some(price_id),
                quantity: Some(quantity),
                ..Default::default()
            },
            ItemUpdate::Create { price_id, quantity } => UpdateSubscriptionItems {
                price: Some(price_id),
                quantity: Some(quantity),
                ..Default::default()
            },
            ItemUpdate::Delete { item_id } => UpdateSubscriptionItems {
                id: Some(item_id),
                deleted: Some(true),
                ..Default::default()
            },
        }
    }
}

/// Stripe proration setting for an item update
pub fn proration_behavior(apply_proration: bool) -> SubscriptionProrationBehavior {
    if apply_proration {
        SubscriptionProrationBehavior::CreateProrations
    } else {
        SubscriptionProrationBehavior::None
    }
}

fn expandable_product_id(product: &Expandable<stripe::Product>) -> String {
    match product {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(p) => p.id.to_string(),
    }
}

fn existing_items(subscription: &Subscription) -> Vec<ExistingItem> {
    subscription
        .items
        .data
        .iter()
        .filter_map(|item| {
            let product = item.price.as_ref().and_then(|p| p.product.as_ref())?;
            Some(ExistingItem {
                item_id: item.id.to_string(),
                product_id: expandable_product_id(product),
            })
        })
        .collect()
}

fn provider_status(status: &StripeSubStatus) -> ProviderSubscriptionStatus {
    match status {
        StripeSubStatus::Active => ProviderSubscriptionStatus::Active,
        StripeSubStatus::PastDue => ProviderSubscriptionStatus::PastDue,
        StripeSubStatus::Canceled => ProviderSubscriptionStatus::Canceled,
        StripeSubStatus::Unpaid => ProviderSubscriptionStatus::Unpaid,
        StripeSubStatus::Trialing => ProviderSubscriptionStatus::Trialing,
        StripeSubStatus::Incomplete => ProviderSubscriptionStatus::Incomplete,
        StripeSubStatus::IncompleteExpired => ProviderSubscriptionStatus::IncompleteExpired,
        StripeSubStatus::Paused => ProviderSubscriptionStatus::Paused,
    }
}

/// Snapshot of a Stripe subscription object
pub fn subscription_data_from_stripe(subscription: &Subscription) -> SubscriptionData {
    let customer_id = match &subscription.customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(c) => c.id.to_string(),
    };

    let products = subscription
        .items
        .data
        .iter()
        .filter_map(|item| {
            let price = item.price.as_ref()?;
            let product = price.product.as_ref()?;
            Some(SubscriptionProduct {
                product_id: expandable_product_id(product),
                price_id: price.id.to_string(),
                quantity: item.quantity.unwrap_or(0),
                subscription_item_id: Some(item.id.to_string()),
            })
        })
        .collect();

    SubscriptionData {
        subscription_id: subscription.id.to_string(),
        customer_id,
        status: provider_status(&subscription.status),
        cancel_at: subscription
            .cancel_at
            .and_then(|t| OffsetDateTime::from_unix_timestamp(t).ok()),
        products,
    }
}

/// Stripe-backed [`SubscriptionDataReconciler`]
#[derive(Clone)]
pub struct StripeSubscriptionClient {
    client: Client,
}

impl StripeSubscriptionClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
        }
    }
}

#[async_trait]
impl SubscriptionDataReconciler for StripeSubscriptionClient {
    async fn reconcile_subscription_data(
        &self,
        subscription_data: &SubscriptionData,
        apply_proration: bool,
    ) -> BillingResult<()> {
        let sub_id = subscription_data
            .subscription_id
            .parse::<SubscriptionId>()
            .map_err(|e| BillingError::StripeApi(format!("Invalid subscription ID: {}", e)))?;

        let current = Subscription::retrieve(&self.client, &sub_id, &[]).await?;
        let updates = plan_item_updates(&existing_items(&current), &subscription_data.products);

        let params = UpdateSubscription {
            items: Some(
                updates
                    .into_iter()
                    .map(UpdateSubscriptionItems::from)
                    .collect(),
            ),
            proration_behavior: Some(proration_behavior(apply_proration)),
            ..Default::default()
        };

        Subscription::update(&self.client, &sub_id, params)
            .await
            .map_err(|e| {
                tracing::error!(
                    subscription_id = %sub_id,
                    error = %e,
                    "Failed to reconcile subscription items with Stripe"
                );
                BillingError::StripeApi(e.to_string())
            })?;

        tracing::info!(
            subscription_id = %sub_id,
            apply_proration = apply_proration,
            products = subscription_data.products.len(),
            "Reconciled subscription items with Stripe"
        );

        Ok(())
    }
}
