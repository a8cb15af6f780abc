//! Plan feature gating

use std::sync::Arc;

use gatekeeper_shared::{WorkspaceFeature, WorkspacePlanName, WorkspacePlanStatus};
use uuid::Uuid;

use crate::error::BillingResult;
use crate::store::BillingStore;

/// Whether a plan tier includes a feature
pub fn plan_has_feature(plan: WorkspacePlanName, feature: WorkspaceFeature) -> bool {
    match plan {
        WorkspacePlanName::Team => matches!(feature, WorkspaceFeature::DomainBasedSecurityPolicies),
        WorkspacePlanName::Pro => matches!(
            feature,
            WorkspaceFeature::DomainBasedSecurityPolicies | WorkspaceFeature::OidcSso
        ),
        WorkspacePlanName::Business
        | WorkspacePlanName::Unlimited
        | WorkspacePlanName::Academia => true,
    }
}

/// Whether a plan in this status still unlocks its features.
///
/// A failed payment keeps access while the provider retries the charge.
pub fn status_grants_access(status: WorkspacePlanStatus) -> bool {
    match status {
        WorkspacePlanStatus::Valid
        | WorkspacePlanStatus::CancelationScheduled
        | WorkspacePlanStatus::PaymentFailed
        | WorkspacePlanStatus::Trial => true,
        WorkspacePlanStatus::Canceled | WorkspacePlanStatus::Expired => false,
    }
}

#[derive(Clone)]
pub struct EntitlementService {
    store: Arc<dyn BillingStore>,
}

impl EntitlementService {
    pub fn new(store: Arc<dyn BillingStore>) -> Self {
        Self { store }
    }

    /// Workspaces without a plan have no gated features
    pub async fn can_workspace_access_feature(
        &self,
        workspace_id: Uuid,
        feature: WorkspaceFeature,
    ) -> BillingResult<bool> {
        let Some(plan) = self.store.get_workspace_plan(workspace_id).await? else {
            return Ok(false);
        };

        let allowed = status_grants_access(plan.status) && plan_has_feature(plan.name, feature);
        Ok(allowed)
    }
}
