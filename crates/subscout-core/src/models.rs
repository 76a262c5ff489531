//! Domain models for subscout

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A raw mail item as fetched from the mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Opaque mailbox identifier (IMAP UID rendered as a string)
    pub id: String,
    pub sender: String,
    pub subject: String,
    /// Parsed `Date` header, if present and well-formed
    pub date: Option<DateTime<Utc>>,
    /// Plain-text body (already converted from HTML when needed)
    pub body: String,
}

/// Kind of recurring service a transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Streaming,
    Music,
    Saas,
    FoodDelivery,
    Telecom,
    CloudPlatform,
    Other,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Music => "music",
            Self::Saas => "saas",
            Self::FoodDelivery => "food_delivery",
            Self::Telecom => "telecom",
            Self::CloudPlatform => "cloud_platform",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for SubscriptionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "streaming" | "video" | "video_streaming" => Ok(Self::Streaming),
            "music" | "music_streaming" => Ok(Self::Music),
            "saas" | "software" => Ok(Self::Saas),
            "food_delivery" | "food" => Ok(Self::FoodDelivery),
            "telecom" | "mobile" => Ok(Self::Telecom),
            "cloud_platform" | "cloud" => Ok(Self::CloudPlatform),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown subscription type: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Capitalized label used in summaries and exports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Monthly => "Monthly",
            Self::Quarterly => "Quarterly",
            Self::Yearly => "Yearly",
        }
    }

    /// Number of months one billing period covers
    pub fn months(&self) -> f64 {
        match self {
            Self::Monthly => 1.0,
            Self::Quarterly => 3.0,
            Self::Yearly => 12.0,
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" | "month" | "mo" => Ok(Self::Monthly),
            "quarterly" | "quarter" => Ok(Self::Quarterly),
            "yearly" | "year" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown billing cycle: {}", s)),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Billing interval inferred from the spacing of repeated charges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Monthly,
    Quarterly,
    Yearly,
    Irregular,
}

impl Cadence {
    /// Map an average gap between charges to a cadence.
    ///
    /// Windows: 25-35 days monthly, 85-95 quarterly, 360-370 yearly.
    pub fn from_average_days(days: f64) -> Self {
        if (25.0..=35.0).contains(&days) {
            Self::Monthly
        } else if (85.0..=95.0).contains(&days) {
            Self::Quarterly
        } else if (360.0..=370.0).contains(&days) {
            Self::Yearly
        } else {
            Self::Irregular
        }
    }

    pub fn billing_cycle(&self) -> Option<BillingCycle> {
        match self {
            Self::Monthly => Some(BillingCycle::Monthly),
            Self::Quarterly => Some(BillingCycle::Quarterly),
            Self::Yearly => Some(BillingCycle::Yearly),
            Self::Irregular => None,
        }
    }
}

/// Which classification stage produced a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Ai,
    #[default]
    Heuristic,
}

/// Classification result for one message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub message_id: String,
    /// Date of the source message
    pub date: Option<NaiveDate>,
    /// Subject line of the source message
    pub description: String,
    /// Positive amount below the configured ceiling, or None when not found
    pub amount: Option<f64>,
    pub merchant: String,
    pub category: String,
    /// Display color for the category (`#RRGGBB`)
    pub color: String,
    /// 0-100
    pub confidence: u8,
    pub bank: String,
    pub is_subscription: bool,
    pub subscription_type: Option<SubscriptionType>,
    pub billing_cycle: Option<BillingCycle>,
    pub service_logo: Option<String>,
    pub is_trial: bool,
    pub trial_reason: Option<String>,
    #[serde(default)]
    pub source: ClassificationSource,
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trial,
    Inactive,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trial => "trial",
            Self::Inactive => "inactive",
        }
    }

    /// Whether the subscription still costs money
    pub fn is_billable(&self) -> bool {
        matches!(self, Self::Active | Self::Trial)
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "trial" => Ok(Self::Trial),
            "inactive" | "cancelled" => Ok(Self::Inactive),
            _ => Err(format!("Unknown subscription status: {}", s)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected or manually declared recurring payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub service_name: String,
    pub category: String,
    pub color: String,
    pub service_logo: Option<String>,
    pub amount: f64,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub last_payment: NaiveDate,
    pub status: SubscriptionStatus,
    pub is_trial: bool,
    pub trial_reason: Option<String>,
    pub auto_detected: bool,
    /// 0-100
    pub confidence: u8,
    pub transaction_count: u32,
    pub bank: String,
}

/// Input for a manually declared subscription
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubscription {
    pub service_name: String,
    pub amount: f64,
    pub billing_cycle: Option<BillingCycle>,
    pub start_date: Option<NaiveDate>,
    pub last_payment: Option<NaiveDate>,
    pub category: Option<String>,
    pub service_logo: Option<String>,
    pub color: Option<String>,
    pub bank: Option<String>,
}

/// Partial update for a ledger record; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    pub service_name: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub status: Option<SubscriptionStatus>,
    pub last_payment: Option<NaiveDate>,
    pub bank: Option<String>,
}

/// Spend aggregates over billable (Active + Trial) subscriptions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_monthly: f64,
    pub total_yearly: f64,
    /// `total_monthly` times the calendar months left in the year, current month included
    pub remaining_year_projection: f64,
    pub months_remaining: u32,
    pub by_service: BTreeMap<String, f64>,
    pub by_category: BTreeMap<String, f64>,
    pub active_count: usize,
    pub trial_count: usize,
    pub inactive_count: usize,
}
