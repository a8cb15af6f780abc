//! Workspace membership events that affect billing
//!
//! Granting a role may require an extra seat. Removing one never releases a
//! seat: seats are only reduced by the customer through the billing portal.

use gatekeeper_shared::WorkspaceRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::seats::{SeatChange, SeatService};

/// Membership event published after a workspace role mutation completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum WorkspaceEvent {
    #[serde(rename = "workspace.role-updated")]
    RoleUpdated {
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    },
    #[serde(rename = "workspace.role-deleted")]
    RoleDeleted {
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    },
    #[serde(rename = "workspace.joined-from-discovery")]
    JoinedFromDiscovery {
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    },
}

impl WorkspaceEvent {
    pub fn workspace_id(&self) -> Uuid {
        match self {
            WorkspaceEvent::RoleUpdated { workspace_id, .. }
            | WorkspaceEvent::RoleDeleted { workspace_id, .. }
            | WorkspaceEvent::JoinedFromDiscovery { workspace_id, .. } => *workspace_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkspaceEvent::RoleUpdated { .. } => "workspace.role-updated",
            WorkspaceEvent::RoleDeleted { .. } => "workspace.role-deleted",
            WorkspaceEvent::JoinedFromDiscovery { .. } => "workspace.joined-from-discovery",
        }
    }
}

/// Billing side effect of a workspace event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Seats(SeatChange),
    /// The workspace has no subscription billing to adjust
    NotBilled,
    /// The event never changes seats
    NoAction,
}

/// Dispatches workspace events to the seat service
#[derive(Clone)]
pub struct WorkspaceEventHandler {
    seats: SeatService,
}

impl WorkspaceEventHandler {
    pub fn new(seats: SeatService) -> Self {
        Self { seats }
    }

    pub async fn handle(&self, event: &WorkspaceEvent) -> BillingResult<EventOutcome> {
        let (workspace_id, role) = match event {
            WorkspaceEvent::RoleUpdated {
                workspace_id, role, ..
            }
            | WorkspaceEvent::JoinedFromDiscovery {
                workspace_id, role, ..
            } => (*workspace_id, *role),
            WorkspaceEvent::RoleDeleted { .. } => return Ok(EventOutcome::NoAction),
        };

        match self.seats.add_seat_if_needed(workspace_id, role).await {
            Ok(change) => Ok(EventOutcome::Seats(change)),
            // Free and granted workspaces have nothing to bill
            Err(
                e @ (BillingError::PlanNotFound(_)
                | BillingError::SubscriptionNotFound(_)
                | BillingError::PlanMismatch(_)),
            ) => {
                tracing::warn!(
                    workspace_id = %workspace_id,
                    event = event.name(),
                    reason = %e,
                    "Skipping seat adjustment for workspace without subscription billing"
                );
                Ok(EventOutcome::NotBilled)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        active_snapshot, fixed_price_catalog, InMemoryBillingStore, RecordingReconciler,
    };
    use gatekeeper_shared::{BillingInterval, WorkspacePlanName, WorkspacePlanStatus};
    use std::sync::Arc;

    fn handler(
        store: &Arc<InMemoryBillingStore>,
        reconciler: &Arc<RecordingReconciler>,
    ) -> WorkspaceEventHandler {
        WorkspaceEventHandler::new(SeatService::new(
            store.clone(),
            store.clone(),
            Arc::new(fixed_price_catalog()),
            reconciler.clone(),
        ))
    }

    fn seed(store: &InMemoryBillingStore, plan: WorkspacePlanName) -> Uuid {
        let workspace_id = Uuid::new_v4();
        store.insert_plan(workspace_id, plan, WorkspacePlanStatus::Valid);
        store.insert_subscription(
            workspace_id,
            BillingInterval::Monthly,
            active_snapshot("sub_1"),
        );
        workspace_id
    }

    #[test]
    fn test_event_serde_names() {
        let event = WorkspaceEvent::RoleDeleted {
            workspace_id: Uuid::nil(),
            user_id: Uuid::nil(),
            role: WorkspaceRole::Guest,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "workspace.role-deleted");
        assert_eq!(json["payload"]["role"], "workspace:guest");
        assert_eq!(event.name(), "workspace.role-deleted");
    }

    #[tokio::test]
    async fn test_role_update_adds_seat() {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());
        let workspace_id = seed(&store, WorkspacePlanName::Team);
        store.set_role_count(workspace_id, WorkspaceRole::Member, 1);

        let outcome = handler(&store, &reconciler)
            .handle(&WorkspaceEvent::RoleUpdated {
                workspace_id,
                user_id: Uuid::new_v4(),
                role: WorkspaceRole::Member,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Seats(SeatChange::Added {
                product_id: "prod_team".to_string(),
                quantity: 1
            })
        );
        assert_eq!(reconciler.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_role_deleted_never_touches_seats() {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());

        let outcome = handler(&store, &reconciler)
            .handle(&WorkspaceEvent::RoleDeleted {
                workspace_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                role: WorkspaceRole::Admin,
            })
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::NoAction);
        assert!(reconciler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unbilled_workspace_is_skipped() {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());
        let workspace_id = seed(&store, WorkspacePlanName::Academia);

        let outcome = handler(&store, &reconciler)
            .handle(&WorkspaceEvent::JoinedFromDiscovery {
                workspace_id,
                user_id: Uuid::new_v4(),
                role: WorkspaceRole::Member,
            })
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::NotBilled);

        let outcome = handler(&store, &reconciler)
            .handle(&WorkspaceEvent::RoleUpdated {
                workspace_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                role: WorkspaceRole::Member,
            })
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::NotBilled);
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());
        reconciler.fail_with("rate_limited");
        let workspace_id = seed(&store, WorkspacePlanName::Pro);
        store.set_role_count(workspace_id, WorkspaceRole::Guest, 1);

        let err = handler(&store, &reconciler)
            .handle(&WorkspaceEvent::RoleUpdated {
                workspace_id,
                user_id: Uuid::new_v4(),
                role: WorkspaceRole::Guest,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::StripeApi(_)));
    }
}
