//! Subscription state reconciliation
//!
//! Translates a provider-reported subscription change into the workspace plan
//! status and stores the new snapshot alongside it.

use std::sync::Arc;

use gatekeeper_shared::WorkspacePlanStatus;
use time::OffsetDateTime;

use crate::catalog::SeatProduct;
use crate::error::{BillingError, BillingResult};
use crate::store::BillingStore;
use crate::types::{ProviderSubscriptionStatus, SubscriptionData};

/// Plan status implied by a provider snapshot at `now`.
///
/// The first matching rule wins. An active subscription whose `cancel_at` has
/// already passed, and any status not listed here, yields `None`.
pub fn derive_plan_status(
    subscription_data: &SubscriptionData,
    now: OffsetDateTime,
) -> Option<WorkspacePlanStatus> {
    match (subscription_data.status, subscription_data.cancel_at) {
        (ProviderSubscriptionStatus::Active, Some(cancel_at)) if cancel_at > now => {
            Some(WorkspacePlanStatus::CancelationScheduled)
        }
        (ProviderSubscriptionStatus::Active, None) => Some(WorkspacePlanStatus::Valid),
        (ProviderSubscriptionStatus::PastDue, _) => Some(WorkspacePlanStatus::PaymentFailed),
        (ProviderSubscriptionStatus::Canceled, _) => Some(WorkspacePlanStatus::Canceled),
        _ => None,
    }
}

/// Subscription service for provider-driven plan status changes
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn BillingStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Apply a provider subscription update.
    ///
    /// Returns the status written to the plan, or `None` when the snapshot did
    /// not determine a status and nothing was written.
    pub async fn handle_subscription_update(
        &self,
        subscription_data: SubscriptionData,
    ) -> BillingResult<Option<WorkspacePlanStatus>> {
        let subscription = self
            .store
            .get_workspace_subscription_by_subscription_id(&subscription_data.subscription_id)
            .await?
            .ok_or_else(|| {
                BillingError::SubscriptionNotFound(subscription_data.subscription_id.clone())
            })?;

        let workspace_id = subscription.workspace_id;
        let plan = self
            .store
            .get_workspace_plan(workspace_id)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound(workspace_id.to_string()))?;

        let now = OffsetDateTime::now_utc();
        let Some(status) = derive_plan_status(&subscription_data, now) else {
            tracing::debug!(
                workspace_id = %workspace_id,
                subscription_id = %subscription_data.subscription_id,
                provider_status = %subscription_data.status,
                cancel_at = ?subscription_data.cancel_at,
                "Subscription update does not determine a plan status, ignoring"
            );
            return Ok(None);
        };

        if let Err(e) = SeatProduct::for_plan(plan.name) {
            tracing::error!(
                workspace_id = %workspace_id,
                subscription_id = %subscription_data.subscription_id,
                plan = %plan.name,
                "Received subscription update for a plan that is not subscription billed"
            );
            return Err(e);
        }

        let updated_plan = plan.with_status(status);
        let updated_subscription = subscription.with_subscription_data(subscription_data, now);

        self.store
            .save_subscription_update(&updated_plan, &updated_subscription)
            .await?;

        tracing::info!(
            workspace_id = %workspace_id,
            subscription_id = %updated_subscription.subscription_data.subscription_id,
            previous_status = %plan.status,
            new_status = %status,
            "Workspace plan status reconciled from subscription"
        );

        Ok(Some(status))
    }
}
