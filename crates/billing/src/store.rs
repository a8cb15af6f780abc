//! Collaborator traits
//!
//! The reconciler and the seat adjuster only see billing state through these
//! traits. Production wiring uses [`crate::pg_store::PgBillingStore`],
//! [`crate::catalog::PriceCatalog`] and
//! [`crate::stripe_client::StripeSubscriptionClient`]; tests use the doubles
//! in [`crate::testing`].

use async_trait::async_trait;
use gatekeeper_shared::{BillingInterval, WorkspaceRole};
use uuid::Uuid;

use crate::catalog::SeatProduct;
use crate::error::BillingResult;
use crate::types::{SubscriptionData, WorkspacePlan, WorkspaceSubscription};

/// Persistence of workspace plans and subscriptions
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn get_workspace_plan(&self, workspace_id: Uuid) -> BillingResult<Option<WorkspacePlan>>;

    async fn get_workspace_subscription(
        &self,
        workspace_id: Uuid,
    ) -> BillingResult<Option<WorkspaceSubscription>>;

    async fn get_workspace_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> BillingResult<Option<WorkspaceSubscription>>;

    async fn upsert_paid_workspace_plan(&self, plan: &WorkspacePlan) -> BillingResult<()>;

    async fn upsert_workspace_subscription(
        &self,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()>;

    /// Persist a plan status change and the matching subscription snapshot.
    ///
    /// Both rows are written or neither is.
    async fn save_subscription_update(
        &self,
        plan: &WorkspacePlan,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()>;
}

/// Live membership counts
#[async_trait]
pub trait WorkspaceRoleCounter: Send + Sync {
    async fn count_workspace_role(
        &self,
        workspace_id: Uuid,
        role: WorkspaceRole,
    ) -> BillingResult<u64>;
}

/// Product and price identifiers of each seat product line
pub trait PlanPricing: Send + Sync {
    fn get_workspace_plan_product_id(&self, product: SeatProduct) -> String;

    fn get_workspace_plan_price(&self, product: SeatProduct, interval: BillingInterval) -> String;
}

/// Pushes a product-line snapshot to the payment provider
#[async_trait]
pub trait SubscriptionDataReconciler: Send + Sync {
    async fn reconcile_subscription_data(
        &self,
        subscription_data: &SubscriptionData,
        apply_proration: bool,
    ) -> BillingResult<()>;
}
