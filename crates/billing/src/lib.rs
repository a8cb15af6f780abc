// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Gatekeeper Billing Module
//!
//! Keeps workspace plans and seat counts in step with Stripe subscriptions.
//!
//! ## Features
//!
//! - **Subscription Reconciliation**: Map provider subscription status onto the workspace plan status
//! - **Seat Adjustment**: Grow seat quantities with proration when roles are granted
//! - **Webhooks**: Feed Stripe subscription events into reconciliation
//! - **Workspace Events**: Turn role grants into seat checks
//! - **Entitlements**: Plan and status based feature gating
//! - **Invariants**: Read-only seat coverage checks

pub mod catalog;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod events;
pub mod invariants;
pub mod pg_store;
pub mod seats;
pub mod store;
pub mod stripe_client;
pub mod subscriptions;
pub mod types;
pub mod webhooks;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;


// Catalog
pub use catalog::{PriceCatalog, ProductPrices, SeatProduct};

// Config
pub use config::{BillingConfig, StripeConfig};

// Entitlements
pub use entitlements::{plan_has_feature, status_grants_access, EntitlementService};

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{EventOutcome, WorkspaceEvent, WorkspaceEventHandler};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Storage
pub use pg_store::PgBillingStore;
pub use store::{BillingStore, PlanPricing, SubscriptionDataReconciler, WorkspaceRoleCounter};

// Seats
pub use seats::{plan_seat_change, SeatChange, SeatService};

// Stripe
pub use stripe_client::{subscription_data_from_stripe, StripeSubscriptionClient};

// Subscriptions
pub use subscriptions::{derive_plan_status, SubscriptionService};

// Types
pub use types::{
    ProviderSubscriptionStatus, SubscriptionData, SubscriptionProduct, WorkspacePlan,
    WorkspaceSubscription,
};

// Webhooks
pub use webhooks::{WebhookHandler, WebhookOutcome};

pub use gatekeeper_shared::{
    BillingInterval, WorkspaceFeature, WorkspacePlanName, WorkspacePlanStatus, WorkspaceRole,
};

use sqlx::PgPool;
use std::sync::Arc;

/// Main billing service that combines all billing functionality
#[derive(Clone)]
pub struct BillingService {
    pub entitlements: EntitlementService,
    pub events: WorkspaceEventHandler,
    pub invariants: InvariantChecker,
    pub seats: SeatService,
    pub subscriptions: SubscriptionService,
    pub webhooks: WebhookHandler,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env(pool: PgPool) -> BillingResult<Self> {
        let config = BillingConfig::from_env()?;
        Ok(Self::new(config, pool))
    }

    /// Create a new billing service with explicit config
    pub fn new(config: BillingConfig, pool: PgPool) -> Self {
        let store = Arc::new(PgBillingStore::new(pool));
        let reconciler = Arc::new(StripeSubscriptionClient::new(&config.stripe));

        Self::with_collaborators(
            store.clone(),
            store,
            Arc::new(config.catalog),
            reconciler,
            config.stripe.webhook_secret,
        )
    }

    /// Assemble the services from explicit collaborators
    pub fn with_collaborators(
        store: Arc<dyn BillingStore>,
        roles: Arc<dyn WorkspaceRoleCounter>,
        pricing: Arc<dyn PlanPricing>,
        reconciler: Arc<dyn SubscriptionDataReconciler>,
        webhook_secret: String,
    ) -> Self {
        let subscriptions = SubscriptionService::new(store.clone());
        let seats = SeatService::new(store.clone(), roles, pricing.clone(), reconciler);

        Self {
            entitlements: EntitlementService::new(store.clone()),
            events: WorkspaceEventHandler::new(seats.clone()),
            invariants: InvariantChecker::new(store, pricing, seats.clone()),
            webhooks: WebhookHandler::new(webhook_secret, subscriptions.clone()),
            seats,
            subscriptions,
        }
    }
}
