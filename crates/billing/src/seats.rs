//! Seat management for workspace subscriptions.
//!
//! Seats only ever grow through this path. After a role is granted the
//! required quantity of the matching product line is recomputed from live
//! membership counts and, if the subscription is short, the provider is asked
//! to bill the difference immediately with proration.
//!
//! The read of the snapshot and the provider update are not guarded by a lock
//! or version check. Concurrent grants compute the same target from live
//! counts, and a stale read that undershoots is corrected by the next grant.

use std::sync::Arc;

use gatekeeper_shared::WorkspaceRole;
use uuid::Uuid;

use crate::catalog::SeatProduct;
use crate::error::{BillingError, BillingResult};
use crate::store::{BillingStore, PlanPricing, SubscriptionDataReconciler, WorkspaceRoleCounter};
use crate::types::{SubscriptionData, SubscriptionProduct};

/// Outcome of a seat check
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SeatChange {
    /// The product line already covers every role holder
    Unchanged { product_id: String, quantity: u64 },
    /// An existing product line was raised
    Increased {
        product_id: String,
        from: u64,
        to: u64,
    },
    /// The product line did not exist and was added
    Added { product_id: String, quantity: u64 },
}

/// Snapshot needed to cover `required` seats on `product_id`, if any.
///
/// A missing line is appended at `required`; an understocked line is raised to
/// `required`; a line with enough seats is left alone and `None` is returned.
pub fn plan_seat_change(
    subscription_data: &SubscriptionData,
    product_id: &str,
    price_id: &str,
    required: u64,
) -> Option<(SubscriptionData, SeatChange)> {
    match subscription_data.product(product_id) {
        None => Some((
            subscription_data.with_product(SubscriptionProduct {
                product_id: product_id.to_string(),
                price_id: price_id.to_string(),
                quantity: required,
                subscription_item_id: None,
            }),
            SeatChange::Added {
                product_id: product_id.to_string(),
                quantity: required,
            },
        )),
        Some(current) if current.quantity >= required => None,
        Some(current) => subscription_data
            .with_product_quantity(product_id, required)
            .map(|updated| {
                (
                    updated,
                    SeatChange::Increased {
                        product_id: product_id.to_string(),
                        from: current.quantity,
                        to: required,
                    },
                )
            }),
    }
}

/// Seat management operations
#[derive(Clone)]
pub struct SeatService {
    store: Arc<dyn BillingStore>,
    roles: Arc<dyn WorkspaceRoleCounter>,
    pricing: Arc<dyn PlanPricing>,
    reconciler: Arc<dyn SubscriptionDataReconciler>,
}

impl SeatService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        roles: Arc<dyn WorkspaceRoleCounter>,
        pricing: Arc<dyn PlanPricing>,
        reconciler: Arc<dyn SubscriptionDataReconciler>,
    ) -> Self {
        Self {
            store,
            roles,
            pricing,
            reconciler,
        }
    }

    /// Live number of seats a product line has to cover
    pub async fn required_seats(
        &self,
        workspace_id: Uuid,
        product: SeatProduct,
    ) -> BillingResult<u64> {
        match product.seat_roles() {
            [role] => self.roles.count_workspace_role(workspace_id, *role).await,
            [first, second] => {
                let (a, b) = tokio::try_join!(
                    self.roles.count_workspace_role(workspace_id, *first),
                    self.roles.count_workspace_role(workspace_id, *second),
                )?;
                Ok(a + b)
            }
            roles => {
                let mut total = 0;
                for role in roles {
                    total += self.roles.count_workspace_role(workspace_id, *role).await?;
                }
                Ok(total)
            }
        }
    }

    /// Make sure the subscription has a seat for every holder of `role`'s product line.
    pub async fn add_seat_if_needed(
        &self,
        workspace_id: Uuid,
        role: WorkspaceRole,
    ) -> BillingResult<SeatChange> {
        let plan = self
            .store
            .get_workspace_plan(workspace_id)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound(workspace_id.to_string()))?;
        let subscription = self
            .store
            .get_workspace_subscription(workspace_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound(workspace_id.to_string()))?;

        let product = SeatProduct::for_role(plan.name, role).inspect_err(|_| {
            tracing::error!(
                workspace_id = %workspace_id,
                plan = %plan.name,
                role = %role,
                "Seat requested for a plan that is not subscription billed"
            );
        })?;

        let required = self.required_seats(workspace_id, product).await?;
        let product_id = self.pricing.get_workspace_plan_product_id(product);
        let price_id = self
            .pricing
            .get_workspace_plan_price(product, subscription.billing_interval);

        let Some((subscription_data, change)) = plan_seat_change(
            &subscription.subscription_data,
            &product_id,
            &price_id,
            required,
        ) else {
            tracing::debug!(
                workspace_id = %workspace_id,
                product = %product,
                required = required,
                "Subscription already has enough seats"
            );
            let quantity = subscription
                .subscription_data
                .product(&product_id)
                .map(|p| p.quantity)
                .unwrap_or(required);
            return Ok(SeatChange::Unchanged {
                product_id,
                quantity,
            });
        };

        self.reconciler
            .reconcile_subscription_data(&subscription_data, true)
            .await?;

        tracing::info!(
            workspace_id = %workspace_id,
            subscription_id = %subscription_data.subscription_id,
            product = %product,
            change = ?change,
            "Workspace subscription seats increased"
        );

        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        active_snapshot, fixed_price_catalog, InMemoryBillingStore, RecordingReconciler,
    };
    use gatekeeper_shared::{BillingInterval, WorkspacePlanName, WorkspacePlanStatus};

    struct Fixture {
        service: SeatService,
        store: Arc<InMemoryBillingStore>,
        reconciler: Arc<RecordingReconciler>,
        workspace_id: Uuid,
    }

    fn fixture(plan: WorkspacePlanName, products: Vec<SubscriptionProduct>) -> Fixture {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());
        let workspace_id = Uuid::new_v4();

        store.insert_plan(workspace_id, plan, WorkspacePlanStatus::Valid);
        let mut data = active_snapshot("sub_1");
        data.products = products;
        store.insert_subscription(workspace_id, BillingInterval::Monthly, data);

        let service = SeatService::new(
            store.clone(),
            store.clone(),
            Arc::new(fixed_price_catalog()),
            reconciler.clone(),
        );
        Fixture {
            service,
            store,
            reconciler,
            workspace_id,
        }
    }

    fn line(product_id: &str, price_id: &str, quantity: u64) -> SubscriptionProduct {
        SubscriptionProduct {
            product_id: product_id.to_string(),
            price_id: price_id.to_string(),
            quantity,
            subscription_item_id: Some(format!("si_{}", product_id)),
        }
    }

    #[test]
    fn test_plan_seat_change_never_decreases() {
        let mut data = active_snapshot("sub_1");
        data.products = vec![line("prod_business", "price_business_monthly", 5)];

        for required in [4, 5] {
            let change = plan_seat_change(
                &data,
                "prod_business",
                "price_business_monthly",
                required,
            );
            assert!(change.is_none());
        }

        let (updated, change) =
            plan_seat_change(&data, "prod_business", "price_business_monthly", 6).unwrap();
        assert_eq!(updated.product("prod_business").unwrap().quantity, 6);
        assert_eq!(
            change,
            SeatChange::Increased {
                product_id: "prod_business".to_string(),
                from: 5,
                to: 6
            }
        );
    }

    #[tokio::test]
    async fn test_understocked_line_is_raised_with_proration() {
        let f = fixture(
            WorkspacePlanName::Business,
            vec![line("prod_business", "price_business_monthly", 3)],
        );
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Member, 3);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Admin, 1);

        let change = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Member)
            .await
            .unwrap();
        assert_eq!(
            change,
            SeatChange::Increased {
                product_id: "prod_business".to_string(),
                from: 3,
                to: 4
            }
        );

        let calls = f.reconciler.calls();
        assert_eq!(calls.len(), 1);
        let (submitted, apply_proration) = &calls[0];
        assert!(*apply_proration);
        assert_eq!(submitted.products.len(), 1);
        assert_eq!(submitted.products[0].quantity, 4);
        assert_eq!(
            submitted.products[0].subscription_item_id.as_deref(),
            Some("si_prod_business")
        );

        // the stored snapshot is left for the provider webhook to update
        let stored = f.store.subscription(f.workspace_id).unwrap();
        assert_eq!(stored.subscription_data.products[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_enough_seats_is_a_no_op() {
        let f = fixture(
            WorkspacePlanName::Business,
            vec![line("prod_business", "price_business_monthly", 5)],
        );
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Member, 2);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Admin, 2);

        let change = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Admin)
            .await
            .unwrap();
        assert_eq!(
            change,
            SeatChange::Unchanged {
                product_id: "prod_business".to_string(),
                quantity: 5
            }
        );
        assert!(f.reconciler.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_guest_line_is_appended() {
        let f = fixture(
            WorkspacePlanName::Team,
            vec![line("prod_team", "price_team_monthly", 2)],
        );
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Guest, 2);

        let change = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Guest)
            .await
            .unwrap();
        assert_eq!(
            change,
            SeatChange::Added {
                product_id: "prod_guest".to_string(),
                quantity: 2
            }
        );

        let calls = f.reconciler.calls();
        let (submitted, apply_proration) = &calls[0];
        assert!(*apply_proration);
        assert_eq!(submitted.products.len(), 2);
        assert_eq!(
            submitted.products[1],
            SubscriptionProduct {
                product_id: "prod_guest".to_string(),
                price_id: "price_guest_monthly".to_string(),
                quantity: 2,
                subscription_item_id: None,
            }
        );
    }

    #[tokio::test]
    async fn test_yearly_subscription_uses_yearly_price() {
        let store = Arc::new(InMemoryBillingStore::new());
        let reconciler = Arc::new(RecordingReconciler::new());
        let workspace_id = Uuid::new_v4();
        store.insert_plan(
            workspace_id,
            WorkspacePlanName::Pro,
            WorkspacePlanStatus::Valid,
        );
        let mut data = active_snapshot("sub_1");
        data.products = vec![];
        store.insert_subscription(workspace_id, BillingInterval::Yearly, data);
        store.set_role_count(workspace_id, WorkspaceRole::Admin, 1);

        let service = SeatService::new(
            store.clone(),
            store.clone(),
            Arc::new(fixed_price_catalog()),
            reconciler.clone(),
        );
        service
            .add_seat_if_needed(workspace_id, WorkspaceRole::Admin)
            .await
            .unwrap();

        let calls = reconciler.calls();
        assert_eq!(calls[0].0.products[0].price_id, "price_pro_yearly");
        assert_eq!(calls[0].0.products[0].product_id, "prod_pro");
    }

    #[tokio::test]
    async fn test_admin_and_member_resolve_to_same_line_and_count() {
        let f = fixture(WorkspacePlanName::Pro, vec![]);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Member, 4);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Admin, 3);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Guest, 9);

        let as_admin = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Admin)
            .await
            .unwrap();
        let as_member = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Member)
            .await
            .unwrap();

        let expected = SeatChange::Added {
            product_id: "prod_pro".to_string(),
            quantity: 7,
        };
        assert_eq!(as_admin, expected);
        assert_eq!(as_member, expected);
    }

    #[tokio::test]
    async fn test_non_seat_plan_is_rejected() {
        for plan in [WorkspacePlanName::Unlimited, WorkspacePlanName::Academia] {
            let f = fixture(plan, vec![]);
            f.store
                .set_role_count(f.workspace_id, WorkspaceRole::Member, 1);

            let err = f
                .service
                .add_seat_if_needed(f.workspace_id, WorkspaceRole::Member)
                .await
                .unwrap_err();
            assert!(matches!(err, BillingError::PlanMismatch(_)));
            assert!(f.reconciler.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_plan_and_subscription() {
        let store = Arc::new(InMemoryBillingStore::new());
        let service = SeatService::new(
            store.clone(),
            store.clone(),
            Arc::new(fixed_price_catalog()),
            Arc::new(RecordingReconciler::new()),
        );
        let workspace_id = Uuid::new_v4();

        let err = service
            .add_seat_if_needed(workspace_id, WorkspaceRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::PlanNotFound(_)));

        store.insert_plan(
            workspace_id,
            WorkspacePlanName::Team,
            WorkspacePlanStatus::Valid,
        );
        let err = service
            .add_seat_if_needed(workspace_id, WorkspaceRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::SubscriptionNotFound(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let f = fixture(WorkspacePlanName::Team, vec![]);
        f.store
            .set_role_count(f.workspace_id, WorkspaceRole::Member, 1);
        f.reconciler.fail_with("card_declined");

        let err = f
            .service
            .add_seat_if_needed(f.workspace_id, WorkspaceRole::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::StripeApi(msg) if msg == "card_declined"));
    }
}
