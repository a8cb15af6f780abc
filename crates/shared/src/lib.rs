#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Shared workspace billing vocabulary
//!
//! Closed enumerations used by the billing crate and by anything that hands it
//! values read from storage or from other services. Parsing is the only place
//! an unknown value can enter; it fails with [`UncoveredVariant`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A value outside one of the closed enumerations below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("uncovered {kind} variant: {value}")]
pub struct UncoveredVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UncoveredVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Billing tier of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspacePlanName {
    Team,
    Pro,
    Business,
    Unlimited,
    Academia,
}

impl WorkspacePlanName {
    pub const ALL: [WorkspacePlanName; 5] = [
        WorkspacePlanName::Team,
        WorkspacePlanName::Pro,
        WorkspacePlanName::Business,
        WorkspacePlanName::Unlimited,
        WorkspacePlanName::Academia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspacePlanName::Team => "team",
            WorkspacePlanName::Pro => "pro",
            WorkspacePlanName::Business => "business",
            WorkspacePlanName::Unlimited => "unlimited",
            WorkspacePlanName::Academia => "academia",
        }
    }

    /// Whether the tier is billed per seat through a provider subscription.
    ///
    /// Unlimited and academia plans are granted, not purchased, and never
    /// carry a subscription.
    pub fn is_seat_based(&self) -> bool {
        match self {
            WorkspacePlanName::Team | WorkspacePlanName::Pro | WorkspacePlanName::Business => true,
            WorkspacePlanName::Unlimited | WorkspacePlanName::Academia => false,
        }
    }
}

impl fmt::Display for WorkspacePlanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkspacePlanName {
    type Err = UncoveredVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(WorkspacePlanName::Team),
            "pro" => Ok(WorkspacePlanName::Pro),
            "business" => Ok(WorkspacePlanName::Business),
            "unlimited" => Ok(WorkspacePlanName::Unlimited),
            "academia" => Ok(WorkspacePlanName::Academia),
            other => Err(UncoveredVariant::new("workspace plan", other)),
        }
    }
}

/// Lifecycle status of a workspace plan; drives feature gating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkspacePlanStatus {
    Valid,
    CancelationScheduled,
    PaymentFailed,
    Canceled,
    Trial,
    Expired,
}

impl WorkspacePlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspacePlanStatus::Valid => "valid",
            WorkspacePlanStatus::CancelationScheduled => "cancelationScheduled",
            WorkspacePlanStatus::PaymentFailed => "paymentFailed",
            WorkspacePlanStatus::Canceled => "canceled",
            WorkspacePlanStatus::Trial => "trial",
            WorkspacePlanStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for WorkspacePlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkspacePlanStatus {
    type Err = UncoveredVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "valid" => Ok(WorkspacePlanStatus::Valid),
            "cancelationScheduled" => Ok(WorkspacePlanStatus::CancelationScheduled),
            "paymentFailed" => Ok(WorkspacePlanStatus::PaymentFailed),
            "canceled" => Ok(WorkspacePlanStatus::Canceled),
            "trial" => Ok(WorkspacePlanStatus::Trial),
            "expired" => Ok(WorkspacePlanStatus::Expired),
            other => Err(UncoveredVariant::new("workspace plan status", other)),
        }
    }
}

/// Role a user holds inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspaceRole {
    #[serde(rename = "workspace:guest")]
    Guest,
    #[serde(rename = "workspace:member")]
    Member,
    #[serde(rename = "workspace:admin")]
    Admin,
}

impl WorkspaceRole {
    pub const ALL: [WorkspaceRole; 3] = [
        WorkspaceRole::Guest,
        WorkspaceRole::Member,
        WorkspaceRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Guest => "workspace:guest",
            WorkspaceRole::Member => "workspace:member",
            WorkspaceRole::Admin => "workspace:admin",
        }
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkspaceRole {
    type Err = UncoveredVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workspace:guest" => Ok(WorkspaceRole::Guest),
            "workspace:member" => Ok(WorkspaceRole::Member),
            "workspace:admin" => Ok(WorkspaceRole::Admin),
            other => Err(UncoveredVariant::new("workspace role", other)),
        }
    }
}

/// Billing cadence, fixed when the subscription is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = UncoveredVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingInterval::Monthly),
            "yearly" => Ok(BillingInterval::Yearly),
            other => Err(UncoveredVariant::new("billing interval", other)),
        }
    }
}

/// Plan-gated workspace capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkspaceFeature {
    DomainBasedSecurityPolicies,
    OidcSso,
    WorkspaceDataRegionSpecificity,
}

impl WorkspaceFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceFeature::DomainBasedSecurityPolicies => "domainBasedSecurityPolicies",
            WorkspaceFeature::OidcSso => "oidcSso",
            WorkspaceFeature::WorkspaceDataRegionSpecificity => "workspaceDataRegionSpecificity",
        }
    }
}

impl fmt::Display for WorkspaceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
