//! Seat product lines and their provider prices

use gatekeeper_shared::{BillingInterval, WorkspacePlanName, WorkspaceRole};

use crate::error::{BillingError, BillingResult};
use crate::store::PlanPricing;

/// A billable seat product line.
///
/// Guests are billed on their own line; members and admins share the line of
/// the workspace's plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeatProduct {
    Guest,
    Team,
    Pro,
    Business,
}

impl SeatProduct {
    pub const ALL: [SeatProduct; 4] = [
        SeatProduct::Guest,
        SeatProduct::Team,
        SeatProduct::Pro,
        SeatProduct::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatProduct::Guest => "guest",
            SeatProduct::Team => "team",
            SeatProduct::Pro => "pro",
            SeatProduct::Business => "business",
        }
    }

    /// Product line of a plan tier; fails for tiers not billed per seat
    pub fn for_plan(plan: WorkspacePlanName) -> BillingResult<Self> {
        match plan {
            WorkspacePlanName::Team => Ok(SeatProduct::Team),
            WorkspacePlanName::Pro => Ok(SeatProduct::Pro),
            WorkspacePlanName::Business => Ok(SeatProduct::Business),
            WorkspacePlanName::Unlimited | WorkspacePlanName::Academia => {
                Err(BillingError::PlanMismatch(plan.to_string()))
            }
        }
    }

    /// Product line a role is billed on within a plan
    pub fn for_role(plan: WorkspacePlanName, role: WorkspaceRole) -> BillingResult<Self> {
        let plan_product = Self::for_plan(plan)?;
        match role {
            WorkspaceRole::Guest => Ok(SeatProduct::Guest),
            WorkspaceRole::Member | WorkspaceRole::Admin => Ok(plan_product),
        }
    }

    /// Roles whose holders occupy a seat on this line
    pub fn seat_roles(&self) -> &'static [WorkspaceRole] {
        match self {
            SeatProduct::Guest => &[WorkspaceRole::Guest],
            SeatProduct::Team | SeatProduct::Pro | SeatProduct::Business => {
                &[WorkspaceRole::Member, WorkspaceRole::Admin]
            }
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            SeatProduct::Guest => "STRIPE_GUEST",
            SeatProduct::Team => "STRIPE_TEAM",
            SeatProduct::Pro => "STRIPE_PRO",
            SeatProduct::Business => "STRIPE_BUSINESS",
        }
    }
}

impl std::fmt::Display for SeatProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider identifiers of one product line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPrices {
    pub product_id: String,
    pub monthly_price_id: String,
    pub yearly_price_id: String,
}

impl ProductPrices {
    pub fn price_for(&self, interval: BillingInterval) -> &str {
        match interval {
            BillingInterval::Monthly => &self.monthly_price_id,
            BillingInterval::Yearly => &self.yearly_price_id,
        }
    }
}

/// Configured product and price ids for every seat product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCatalog {
    pub guest: ProductPrices,
    pub team: ProductPrices,
    pub pro: ProductPrices,
    pub business: ProductPrices,
}

impl PriceCatalog {
    /// Load from `STRIPE_<PRODUCT>_PRODUCT_ID`, `STRIPE_<PRODUCT>_MONTHLY_PRICE_ID`
    /// and `STRIPE_<PRODUCT>_YEARLY_PRICE_ID`.
    pub fn from_env() -> BillingResult<Self> {
        Ok(Self {
            guest: prices_from_env(SeatProduct::Guest)?,
            team: prices_from_env(SeatProduct::Team)?,
            pro: prices_from_env(SeatProduct::Pro)?,
            business: prices_from_env(SeatProduct::Business)?,
        })
    }

    pub fn prices(&self, product: SeatProduct) -> &ProductPrices {
        match product {
            SeatProduct::Guest => &self.guest,
            SeatProduct::Team => &self.team,
            SeatProduct::Pro => &self.pro,
            SeatProduct::Business => &self.business,
        }
    }

    /// Reverse lookup from a provider product id
    pub fn seat_product_for_product_id(&self, product_id: &str) -> Option<SeatProduct> {
        SeatProduct::ALL
            .into_iter()
            .find(|p| self.prices(*p).product_id == product_id)
    }
}

impl PlanPricing for PriceCatalog {
    fn get_workspace_plan_product_id(&self, product: SeatProduct) -> String {
        self.prices(product).product_id.clone()
    }

    fn get_workspace_plan_price(&self, product: SeatProduct, interval: BillingInterval) -> String {
        self.prices(product).price_for(interval).to_string()
    }
}

fn prices_from_env(product: SeatProduct) -> BillingResult<ProductPrices> {
    let prefix = product.env_prefix();
    Ok(ProductPrices {
        product_id: required_env(&format!("{}_PRODUCT_ID", prefix))?,
        monthly_price_id: required_env(&format!("{}_MONTHLY_PRICE_ID", prefix))?,
        yearly_price_id: required_env(&format!("{}_YEARLY_PRICE_ID", prefix))?,
    })
}

pub(crate) fn required_env(name: &str) -> BillingResult<String> {
    std::env::var(name)
        .map_err(|_| BillingError::Config(format!("{} must be set", name)))
}
