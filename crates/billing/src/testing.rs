// Test doubles - lock poisoning only happens after a test already panicked
#![allow(clippy::unwrap_used)]

//! In-memory collaborators for tests.
//!
//! Enabled for this crate's tests and, for downstream crates, with the
//! `test-utils` feature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gatekeeper_shared::{BillingInterval, WorkspacePlanName, WorkspacePlanStatus, WorkspaceRole};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::catalog::{PriceCatalog, ProductPrices};
use crate::error::{BillingError, BillingResult};
use crate::store::{BillingStore, SubscriptionDataReconciler, WorkspaceRoleCounter};
use crate::types::{
    ProviderSubscriptionStatus, SubscriptionData, WorkspacePlan, WorkspaceSubscription,
};

/// Install a fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Catalog with predictable ids: `prod_<product>` and `price_<product>_<interval>`
pub fn fixed_price_catalog() -> PriceCatalog {
    let prices = |name: &str| ProductPrices {
        product_id: format!("prod_{}", name),
        monthly_price_id: format!("price_{}_monthly", name),
        yearly_price_id: format!("price_{}_yearly", name),
    };
    PriceCatalog {
        guest: prices("guest"),
        team: prices("team"),
        pro: prices("pro"),
        business: prices("business"),
    }
}

/// Active snapshot with no cancellation and no product lines
pub fn active_snapshot(subscription_id: &str) -> SubscriptionData {
    SubscriptionData {
        subscription_id: subscription_id.to_string(),
        customer_id: "cus_test".to_string(),
        status: ProviderSubscriptionStatus::Active,
        cancel_at: None,
        products: Vec::new(),
    }
}

/// Stripe subscription item payload. `product` is an id string or an expanded object.
pub fn stripe_item_json(
    item_id: &str,
    product: serde_json::Value,
    price_id: &str,
    quantity: Option<u64>,
) -> serde_json::Value {
    serde_json::json!({
        "id": item_id,
        "object": "subscription_item",
        "created": 1_700_000_000,
        "metadata": {},
        "price": {
            "id": price_id,
            "object": "price",
            "active": true,
            "currency": "usd",
            "product": product,
            "type": "recurring",
            "unit_amount": 1200
        },
        "quantity": quantity,
        "tax_rates": []
    })
}

/// Stripe subscription payload. `customer` is an id string or an expanded object.
pub fn stripe_subscription_json(
    subscription_id: &str,
    customer: serde_json::Value,
    status: &str,
    cancel_at: Option<i64>,
    items: Vec<serde_json::Value>,
) -> serde_json::Value {
    serde_json::json!({
        "id": subscription_id,
        "object": "subscription",
        "automatic_tax": { "enabled": false, "liability": null },
        "billing_cycle_anchor": 1_700_000_000,
        "cancel_at": cancel_at,
        "cancel_at_period_end": false,
        "collection_method": "charge_automatically",
        "created": 1_700_000_000,
        "currency": "usd",
        "current_period_end": 1_702_592_000,
        "current_period_start": 1_700_000_000,
        "customer": customer,
        "items": {
            "object": "list",
            "data": items,
            "has_more": false,
            "url": format!("/v1/subscription_items?subscription={}", subscription_id)
        },
        "livemode": false,
        "metadata": {},
        "start_date": 1_700_000_000,
        "status": status
    })
}

/// Stripe event payload wrapping `object`
pub fn stripe_event_json(event_type: &str, object: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": "evt_test",
        "object": "event",
        "api_version": "2023-10-16",
        "created": 1_700_000_000,
        "data": { "object": object },
        "livemode": false,
        "pending_webhooks": 1,
        "request": null,
        "type": event_type
    })
}

#[derive(Default)]
struct State {
    plans: HashMap<Uuid, WorkspacePlan>,
    subscriptions: HashMap<Uuid, WorkspaceSubscription>,
    role_counts: HashMap<(Uuid, WorkspaceRole), u64>,
    writes: usize,
}

/// In-memory billing store and role counter.
///
/// All state sits behind one lock so a combined plan and subscription write is
/// applied atomically.
#[derive(Default, Clone)]
pub struct InMemoryBillingStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a plan created a day ago
    pub fn insert_plan(
        &self,
        workspace_id: Uuid,
        name: WorkspacePlanName,
        status: WorkspacePlanStatus,
    ) {
        let plan = WorkspacePlan {
            workspace_id,
            name,
            status,
            created_at: OffsetDateTime::now_utc() - Duration::days(1),
        };
        self.state.lock().unwrap().plans.insert(workspace_id, plan);
    }

    /// Seed a subscription created and last updated a day ago
    pub fn insert_subscription(
        &self,
        workspace_id: Uuid,
        billing_interval: BillingInterval,
        subscription_data: SubscriptionData,
    ) {
        let created_at = OffsetDateTime::now_utc() - Duration::days(1);
        let subscription = WorkspaceSubscription {
            workspace_id,
            subscription_data,
            billing_interval,
            current_billing_cycle_end: created_at + Duration::days(30),
            created_at,
            updated_at: created_at,
        };
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .insert(workspace_id, subscription);
    }

    pub fn set_role_count(&self, workspace_id: Uuid, role: WorkspaceRole, count: u64) {
        self.state
            .lock()
            .unwrap()
            .role_counts
            .insert((workspace_id, role), count);
    }

    pub fn plan(&self, workspace_id: Uuid) -> Option<WorkspacePlan> {
        self.state.lock().unwrap().plans.get(&workspace_id).cloned()
    }

    pub fn subscription(&self, workspace_id: Uuid) -> Option<WorkspaceSubscription> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .get(&workspace_id)
            .cloned()
    }

    /// Number of upserts applied through the store traits
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn get_workspace_plan(&self, workspace_id: Uuid) -> BillingResult<Option<WorkspacePlan>> {
        Ok(self.plan(workspace_id))
    }

    async fn get_workspace_subscription(
        &self,
        workspace_id: Uuid,
    ) -> BillingResult<Option<WorkspaceSubscription>> {
        Ok(self.subscription(workspace_id))
    }

    async fn get_workspace_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> BillingResult<Option<WorkspaceSubscription>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .find(|s| s.subscription_data.subscription_id == subscription_id)
            .cloned())
    }

    async fn upsert_paid_workspace_plan(&self, plan: &WorkspacePlan) -> BillingResult<()> {
        let mut state = self.state.lock().unwrap();
        state.plans.insert(plan.workspace_id, plan.clone());
        state.writes += 1;
        Ok(())
    }

    async fn upsert_workspace_subscription(
        &self,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .subscriptions
            .insert(subscription.workspace_id, subscription.clone());
        state.writes += 1;
        Ok(())
    }

    async fn save_subscription_update(
        &self,
        plan: &WorkspacePlan,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()> {
        if plan.workspace_id != subscription.workspace_id {
            return Err(BillingError::Internal(
                "plan and subscription belong to different workspaces".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        state.plans.insert(plan.workspace_id, plan.clone());
        state
            .subscriptions
            .insert(subscription.workspace_id, subscription.clone());
        state.writes += 2;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRoleCounter for InMemoryBillingStore {
    async fn count_workspace_role(
        &self,
        workspace_id: Uuid,
        role: WorkspaceRole,
    ) -> BillingResult<u64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .role_counts
            .get(&(workspace_id, role))
            .copied()
            .unwrap_or(0))
    }
}

/// Records every snapshot pushed to the provider
#[derive(Default, Clone)]
pub struct RecordingReconciler {
    calls: Arc<Mutex<Vec<(SubscriptionData, bool)>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl RecordingReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail with a provider error
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<(SubscriptionData, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionDataReconciler for RecordingReconciler {
    async fn reconcile_subscription_data(
        &self,
        subscription_data: &SubscriptionData,
        apply_proration: bool,
    ) -> BillingResult<()> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(BillingError::StripeApi(message));
        }
        self.calls
            .lock()
            .unwrap()
            .push((subscription_data.clone(), apply_proration));
        Ok(())
    }
}
