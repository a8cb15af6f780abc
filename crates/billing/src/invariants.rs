//! Billing Invariants Module
//!
//! Runnable consistency checks for workspace seat billing. Every product line
//! of a subscription must cover the live number of role holders billed on it.
//! The seat service restores this after a role grant; the checker lets an
//! operator confirm it for any workspace.
//!
//! Checks only read, never write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::SeatProduct;
use crate::error::BillingResult;
use crate::seats::SeatService;
use crate::store::{BillingStore, PlanPricing};

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    pub workspace_id: Uuid,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - system may be charging incorrectly
    Critical,
    /// High - data inconsistency that needs attention
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - minor inconsistency, informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of the checks run for one workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub workspace_id: Uuid,
    /// Product lines that were checked
    pub checks_run: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

/// Service for running seat invariant checks
#[derive(Clone)]
pub struct InvariantChecker {
    store: Arc<dyn BillingStore>,
    pricing: Arc<dyn PlanPricing>,
    seats: SeatService,
}

impl InvariantChecker {
    pub fn new(
        store: Arc<dyn BillingStore>,
        pricing: Arc<dyn PlanPricing>,
        seats: SeatService,
    ) -> Self {
        Self {
            store,
            pricing,
            seats,
        }
    }

    /// Check every seat product line of a workspace.
    ///
    /// Workspaces without a plan, without a subscription, or on a tier that is
    /// not billed per seat have nothing to check. Surplus seats are reported
    /// at `Low` and do not make the workspace unhealthy.
    pub async fn check_workspace_seats(
        &self,
        workspace_id: Uuid,
    ) -> BillingResult<InvariantCheckSummary> {
        let checked_at = OffsetDateTime::now_utc();
        let mut violations = Vec::new();
        let mut checks_run = 0;

        let plan = self.store.get_workspace_plan(workspace_id).await?;
        let subscription = self.store.get_workspace_subscription(workspace_id).await?;

        if let (Some(plan), Some(subscription)) = (plan, subscription) {
            if let Ok(plan_product) = SeatProduct::for_plan(plan.name) {
                for product in [plan_product, SeatProduct::Guest] {
                    checks_run += 1;
                    let required = self.seats.required_seats(workspace_id, product).await?;
                    let product_id = self.pricing.get_workspace_plan_product_id(product);
                    let purchased = subscription
                        .subscription_data
                        .product(&product_id)
                        .map(|p| p.quantity);

                    let Some((invariant, severity)) =
                        seat_line_severity(product, purchased, required)
                    else {
                        continue;
                    };

                    let purchased = purchased.unwrap_or(0);
                    violations.push(InvariantViolation {
                        invariant: invariant.to_string(),
                        workspace_id,
                        description: format!(
                            "{} product line has {} seats for {} role holders",
                            product, purchased, required
                        ),
                        context: serde_json::json!({
                            "product_id": product_id,
                            "purchased": purchased,
                            "required": required,
                            "subscription_id": subscription.subscription_data.subscription_id,
                        }),
                        severity,
                    });
                }
            }
        }

        for violation in &violations {
            tracing::warn!(
                workspace_id = %workspace_id,
                invariant = %violation.invariant,
                severity = %violation.severity,
                "{}",
                violation.description
            );
        }

        Ok(InvariantCheckSummary {
            checked_at,
            workspace_id,
            checks_run,
            healthy: violations
                .iter()
                .all(|v| v.severity == ViolationSeverity::Low),
            violations,
        })
    }
}

/// Grade one product line against the live number of role holders.
///
/// A missing line with holders bills nothing for them; a short plan line
/// under-bills paying members; a short guest line under-bills guests; surplus
/// seats stay until the next renewal.
fn seat_line_severity(
    product: SeatProduct,
    purchased: Option<u64>,
    required: u64,
) -> Option<(&'static str, ViolationSeverity)> {
    match purchased {
        None if required > 0 => Some(("seat_line_exists", ViolationSeverity::Critical)),
        None => None,
        Some(purchased) if purchased < required => match product {
            SeatProduct::Guest => Some(("seats_cover_role_holders", ViolationSeverity::Medium)),
            SeatProduct::Team | SeatProduct::Pro | SeatProduct::Business => {
                Some(("seats_cover_role_holders", ViolationSeverity::High))
            }
        },
        Some(purchased) if purchased > required => {
            Some(("seats_match_role_holders", ViolationSeverity::Low))
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        active_snapshot, fixed_price_catalog, InMemoryBillingStore, RecordingReconciler,
    };
    use crate::types::SubscriptionProduct;
    use gatekeeper_shared::{
        BillingInterval, WorkspacePlanName, WorkspacePlanStatus, WorkspaceRole,
    };

    fn checker(store: &Arc<InMemoryBillingStore>) -> InvariantChecker {
        let pricing = Arc::new(fixed_price_catalog());
        let seats = SeatService::new(
            store.clone(),
            store.clone(),
            pricing.clone(),
            Arc::new(RecordingReconciler::new()),
        );
        InvariantChecker::new(store.clone(), pricing, seats)
    }

    fn line(name: &str, quantity: u64) -> SubscriptionProduct {
        SubscriptionProduct {
            product_id: format!("prod_{}", name),
            price_id: format!("price_{}_monthly", name),
            quantity,
            subscription_item_id: None,
        }
    }

    fn seed(
        store: &InMemoryBillingStore,
        plan: WorkspacePlanName,
        products: Vec<SubscriptionProduct>,
    ) -> Uuid {
        let workspace_id = Uuid::new_v4();
        store.insert_plan(workspace_id, plan, WorkspacePlanStatus::Valid);
        let mut data = active_snapshot("sub_1");
        data.products = products;
        store.insert_subscription(workspace_id, BillingInterval::Monthly, data);
        workspace_id
    }

    #[tokio::test]
    async fn test_understocked_plan_line_is_high() {
        let store = Arc::new(InMemoryBillingStore::new());
        let workspace_id = seed(
            &store,
            WorkspacePlanName::Business,
            vec![line("business", 3), line("guest", 2)],
        );
        store.set_role_count(workspace_id, WorkspaceRole::Member, 3);
        store.set_role_count(workspace_id, WorkspaceRole::Admin, 1);
        store.set_role_count(workspace_id, WorkspaceRole::Guest, 2);

        let summary = checker(&store)
            .check_workspace_seats(workspace_id)
            .await
            .unwrap();
        assert_eq!(summary.checks_run, 2);
        assert!(!summary.healthy);
        assert_eq!(summary.violations.len(), 1);

        let violation = &summary.violations[0];
        assert_eq!(violation.invariant, "seats_cover_role_holders");
        assert_eq!(violation.severity, ViolationSeverity::High);
        assert_eq!(violation.context["product_id"], "prod_business");
        assert_eq!(violation.context["purchased"], 3);
        assert_eq!(violation.context["required"], 4);
    }

    #[tokio::test]
    async fn test_missing_guest_line_with_guests_is_critical() {
        let store = Arc::new(InMemoryBillingStore::new());
        let workspace_id = seed(&store, WorkspacePlanName::Team, vec![]);
        store.set_role_count(workspace_id, WorkspaceRole::Guest, 1);

        let summary = checker(&store)
            .check_workspace_seats(workspace_id)
            .await
            .unwrap();
        assert_eq!(summary.violations.len(), 1);
        assert_eq!(summary.violations[0].invariant, "seat_line_exists");
        assert_eq!(summary.violations[0].severity, ViolationSeverity::Critical);
        assert_eq!(summary.violations[0].context["product_id"], "prod_guest");
        assert_eq!(summary.violations[0].context["purchased"], 0);
    }

    #[tokio::test]
    async fn test_understocked_guest_line_is_medium() {
        let store = Arc::new(InMemoryBillingStore::new());
        let workspace_id = seed(
            &store,
            WorkspacePlanName::Pro,
            vec![line("pro", 1), line("guest", 1)],
        );
        store.set_role_count(workspace_id, WorkspaceRole::Admin, 1);
        store.set_role_count(workspace_id, WorkspaceRole::Guest, 3);

        let summary = checker(&store)
            .check_workspace_seats(workspace_id)
            .await
            .unwrap();
        assert!(!summary.healthy);
        assert_eq!(summary.violations.len(), 1);
        assert_eq!(summary.violations[0].severity, ViolationSeverity::Medium);
        assert_eq!(summary.violations[0].context["required"], 3);
    }

    #[tokio::test]
    async fn test_surplus_seats_are_low_and_healthy() {
        let store = Arc::new(InMemoryBillingStore::new());
        let workspace_id = seed(
            &store,
            WorkspacePlanName::Team,
            vec![line("team", 6), line("guest", 2)],
        );
        store.set_role_count(workspace_id, WorkspaceRole::Member, 4);
        store.set_role_count(workspace_id, WorkspaceRole::Guest, 2);

        let summary = checker(&store)
            .check_workspace_seats(workspace_id)
            .await
            .unwrap();
        assert!(summary.healthy);
        assert_eq!(summary.violations.len(), 1);

        let violation = &summary.violations[0];
        assert_eq!(violation.invariant, "seats_match_role_holders");
        assert_eq!(violation.severity, ViolationSeverity::Low);
        assert_eq!(violation.severity.to_string(), "LOW");
        assert_eq!(violation.context["purchased"], 6);
    }

    #[tokio::test]
    async fn test_unbilled_workspaces_are_healthy() {
        let store = Arc::new(InMemoryBillingStore::new());
        let academia = seed(&store, WorkspacePlanName::Academia, vec![]);
        store.set_role_count(academia, WorkspaceRole::Member, 10);

        let checker = checker(&store);
        for workspace_id in [academia, Uuid::new_v4()] {
            let summary = checker.check_workspace_seats(workspace_id).await.unwrap();
            assert!(summary.healthy);
            assert_eq!(summary.checks_run, 0);
        }
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
    }
}
