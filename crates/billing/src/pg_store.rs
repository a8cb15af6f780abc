//! Postgres-backed billing store
//!
//! Expected tables:
//!
//! - `workspace_plans (workspace_id uuid primary key, name text, status text, created_at timestamptz)`
//! - `workspace_subscriptions (workspace_id uuid primary key, subscription_data jsonb,
//!   billing_interval text, current_billing_cycle_end timestamptz, created_at timestamptz,
//!   updated_at timestamptz)`
//! - `workspace_acl (user_id, workspace_id uuid, role text)`

use async_trait::async_trait;
use gatekeeper_shared::WorkspaceRole;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::store::{BillingStore, WorkspaceRoleCounter};
use crate::types::{SubscriptionData, WorkspacePlan, WorkspaceSubscription};

/// Row type for workspace_plans
#[derive(Debug, sqlx::FromRow)]
struct WorkspacePlanRow {
    workspace_id: Uuid,
    name: String,
    status: String,
    created_at: OffsetDateTime,
}

impl TryFrom<WorkspacePlanRow> for WorkspacePlan {
    type Error = BillingError;

    fn try_from(row: WorkspacePlanRow) -> Result<Self, Self::Error> {
        Ok(WorkspacePlan {
            workspace_id: row.workspace_id,
            name: row.name.parse()?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

/// Row type for workspace_subscriptions
#[derive(Debug, sqlx::FromRow)]
struct WorkspaceSubscriptionRow {
    workspace_id: Uuid,
    subscription_data: Json<SubscriptionData>,
    billing_interval: String,
    current_billing_cycle_end: OffsetDateTime,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<WorkspaceSubscriptionRow> for WorkspaceSubscription {
    type Error = BillingError;

    fn try_from(row: WorkspaceSubscriptionRow) -> Result<Self, Self::Error> {
        Ok(WorkspaceSubscription {
            workspace_id: row.workspace_id,
            subscription_data: row.subscription_data.0,
            billing_interval: row.billing_interval.parse()?,
            current_billing_cycle_end: row.current_billing_cycle_end,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const UPSERT_PLAN: &str = r#"
    INSERT INTO workspace_plans (workspace_id, name, status, created_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (workspace_id) DO UPDATE SET
        name = EXCLUDED.name,
        status = EXCLUDED.status
"#;

const UPSERT_SUBSCRIPTION: &str = r#"
    INSERT INTO workspace_subscriptions (
        workspace_id, subscription_data, billing_interval,
        current_billing_cycle_end, created_at, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (workspace_id) DO UPDATE SET
        subscription_data = EXCLUDED.subscription_data,
        billing_interval = EXCLUDED.billing_interval,
        current_billing_cycle_end = EXCLUDED.current_billing_cycle_end,
        updated_at = EXCLUDED.updated_at
"#;

const SELECT_SUBSCRIPTION: &str = r#"
    SELECT workspace_id, subscription_data, billing_interval,
           current_billing_cycle_end, created_at, updated_at
    FROM workspace_subscriptions
"#;

/// Billing store over a Postgres pool
#[derive(Clone)]
pub struct PgBillingStore {
    pool: PgPool,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_plan(
        tx: &mut Transaction<'_, Postgres>,
        plan: &WorkspacePlan,
    ) -> BillingResult<()> {
        if !plan.name.is_seat_based() {
            return Err(BillingError::PlanMismatch(plan.name.to_string()));
        }
        sqlx::query(UPSERT_PLAN)
            .bind(plan.workspace_id)
            .bind(plan.name.as_str())
            .bind(plan.status.as_str())
            .bind(plan.created_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn write_subscription(
        tx: &mut Transaction<'_, Postgres>,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()> {
        sqlx::query(UPSERT_SUBSCRIPTION)
            .bind(subscription.workspace_id)
            .bind(Json(&subscription.subscription_data))
            .bind(subscription.billing_interval.as_str())
            .bind(subscription.current_billing_cycle_end)
            .bind(subscription.created_at)
            .bind(subscription.updated_at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BillingStore for PgBillingStore {
    async fn get_workspace_plan(&self, workspace_id: Uuid) -> BillingResult<Option<WorkspacePlan>> {
        let row: Option<WorkspacePlanRow> = sqlx::query_as(
            "SELECT workspace_id, name, status, created_at FROM workspace_plans WHERE workspace_id = $1",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkspacePlan::try_from).transpose()
    }

    async fn get_workspace_subscription(
        &self,
        workspace_id: Uuid,
    ) -> BillingResult<Option<WorkspaceSubscription>> {
        let row: Option<WorkspaceSubscriptionRow> =
            sqlx::query_as(&format!("{} WHERE workspace_id = $1", SELECT_SUBSCRIPTION))
                .bind(workspace_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(WorkspaceSubscription::try_from).transpose()
    }

    async fn get_workspace_subscription_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> BillingResult<Option<WorkspaceSubscription>> {
        let row: Option<WorkspaceSubscriptionRow> = sqlx::query_as(&format!(
            "{} WHERE subscription_data->>'subscription_id' = $1",
            SELECT_SUBSCRIPTION
        ))
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkspaceSubscription::try_from).transpose()
    }

    async fn upsert_paid_workspace_plan(&self, plan: &WorkspacePlan) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_plan(&mut tx, plan).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_workspace_subscription(
        &self,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::write_subscription(&mut tx, subscription).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_subscription_update(
        &self,
        plan: &WorkspacePlan,
        subscription: &WorkspaceSubscription,
    ) -> BillingResult<()> {
        // Rolled back on drop if either write fails
        let mut tx = self.pool.begin().await?;
        Self::write_plan(&mut tx, plan).await?;
        Self::write_subscription(&mut tx, subscription).await?;
        tx.commit().await.map_err(|e| {
            tracing::error!(
                workspace_id = %plan.workspace_id,
                error = %e,
                "Failed to commit workspace plan and subscription update"
            );
            BillingError::Database(e.to_string())
        })?;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceRoleCounter for PgBillingStore {
    async fn count_workspace_role(
        &self,
        workspace_id: Uuid,
        role: WorkspaceRole,
    ) -> BillingResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workspace_acl WHERE workspace_id = $1 AND role = $2",
        )
        .bind(workspace_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        u64::try_from(count)
            .map_err(|_| BillingError::Internal(format!("negative role count: {}", count)))
    }
}
