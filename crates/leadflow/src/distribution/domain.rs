use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for captured quote requests.
    LeadId
);
string_id!(
    /// Identifier wrapper for service providers.
    ProviderId
);
string_id!(
    /// Identifier wrapper for lead-to-provider offers.
    DistributionId
);
string_id!(
    /// Identifier wrapper for booked work.
    JobId
);

/// Rounds a monetary amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Pickup location captured on the quote form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadLocation {
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl LeadLocation {
    pub fn zip(zip: &str) -> Self {
        Self {
            zip: Some(zip.to_string()),
            city: None,
            state: None,
        }
    }

    pub fn city_state(city: &str, state: &str) -> Self {
        Self {
            zip: None,
            city: Some(city.to_string()),
            state: Some(state.to_string()),
        }
    }

    /// Trimmed zip code, `None` when absent or blank.
    pub fn zip_code(&self) -> Option<&str> {
        non_blank(self.zip.as_deref())
    }

    pub fn city_and_state(&self) -> Option<(&str, &str)> {
        match (non_blank(self.city.as_deref()), non_blank(self.state.as_deref())) {
            (Some(city), Some(state)) => Some((city, state)),
            _ => None,
        }
    }

    /// A location can be matched when it has a zip or a full city+state pair.
    pub fn is_addressable(&self) -> bool {
        self.zip_code().is_some() || self.city_and_state().is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Price estimate shown to the customer, either a single amount or a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimatedValue {
    Range { low: Decimal, high: Decimal },
    Amount(Decimal),
}

impl EstimatedValue {
    /// Point estimate used for eligibility, fan-out sizing, and bids.
    pub fn point(&self) -> Decimal {
        match self {
            EstimatedValue::Amount(amount) => round_money(*amount),
            EstimatedValue::Range { low, high } => round_money(midpoint(*low, *high)),
        }
    }
}

/// Overflow-free midpoint: when the sum does not fit, the span does.
fn midpoint(low: Decimal, high: Decimal) -> Decimal {
    low.checked_add(high)
        .map(|sum| sum / Decimal::TWO)
        .or_else(|| {
            high.checked_sub(low)
                .and_then(|span| low.checked_add(span / Decimal::TWO))
        })
        .unwrap_or(low)
}

/// Line item on the pickup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadItem {
    pub item_type: String,
    pub quantity: u32,
}

/// Lifecycle of a captured lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Pending,
    Sent,
    Accepted,
    Booked,
    Expired,
}

impl LeadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Sent => "sent",
            LeadStatus::Accepted => "accepted",
            LeadStatus::Booked => "booked",
            LeadStatus::Expired => "expired",
        }
    }

    /// Leads still open to being offered to providers.
    pub fn is_distributable(&self) -> bool {
        matches!(self, LeadStatus::Pending | LeadStatus::Sent)
    }
}

/// Quote form payload before it is accepted as a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    pub location: LeadLocation,
    #[serde(default)]
    pub estimated_value: Option<EstimatedValue>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub items: Vec<LeadItem>,
}

/// Stored lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub location: LeadLocation,
    pub estimated_value: Option<EstimatedValue>,
    pub urgent: bool,
    pub items: Vec<LeadItem>,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn point_estimate(&self) -> Option<Decimal> {
        self.estimated_value.as_ref().map(EstimatedValue::point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Active,
    Pending,
    Suspended,
}

/// Subscription plan. Unrecognized labels deserialize as `Basic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum SubscriptionTier {
    Basic,
    Professional,
    Elite,
}

impl From<&str> for SubscriptionTier {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ELITE" => Self::Elite,
            "PROFESSIONAL" => Self::Professional,
            _ => Self::Basic,
        }
    }
}

impl From<String> for SubscriptionTier {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

/// Geographic unit a provider accepts work from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceArea {
    pub zip_code: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl ServiceArea {
    /// Zip match when the lead carries a zip, city+state otherwise.
    pub fn matches(&self, location: &LeadLocation) -> bool {
        if let Some(zip) = location.zip_code() {
            return self.zip_code.trim() == zip;
        }

        match (
            location.city_and_state(),
            non_blank(self.city.as_deref()),
            non_blank(self.state.as_deref()),
        ) {
            (Some((city, state)), Some(area_city), Some(area_state)) => {
                city.eq_ignore_ascii_case(area_city) && state.eq_ignore_ascii_case(area_state)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStrategy {
    PercentageBelow,
    FixedAmount,
}

/// Provider-controlled automatic bidding and capacity settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoBidSettings {
    pub enabled: bool,
    pub strategy: Option<BidStrategy>,
    pub percentage: Option<Decimal>,
    pub fixed_amount: Option<Decimal>,
    pub max_bid_amount: Option<Decimal>,
    pub min_job_value: Option<Decimal>,
    pub max_job_value: Option<Decimal>,
    pub max_jobs_per_day: Option<u32>,
}

impl AutoBidSettings {
    pub fn has_capacity(&self, jobs_today: u32) -> bool {
        self.max_jobs_per_day.map_or(true, |max| jobs_today < max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub business_name: String,
    pub status: ProviderStatus,
    pub tier: SubscriptionTier,
    pub service_areas: Vec<ServiceArea>,
    pub lead_credits: i64,
    pub avg_response_minutes: f64,
    pub acceptance_rate: f64,
    pub rating: f64,
    pub total_jobs: u32,
    #[serde(default)]
    pub auto_bid: AutoBidSettings,
}

impl Provider {
    /// First matching service area, preferring one flagged as primary.
    pub fn matched_area(&self, location: &LeadLocation) -> Option<&ServiceArea> {
        let mut matching = self
            .service_areas
            .iter()
            .filter(|area| area.matches(location));
        let first = matching.next()?;
        if first.is_primary {
            return Some(first);
        }
        matching.find(|area| area.is_primary).or(Some(first))
    }
}

/// Directory row: a provider plus the number of jobs it has booked for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    pub provider: Provider,
    pub jobs_today: u32,
}

/// Offer status. Progress is forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionStatus {
    Sent,
    Viewed,
    Accepted,
    Declined,
    Expired,
}

impl DistributionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DistributionStatus::Sent => "sent",
            DistributionStatus::Viewed => "viewed",
            DistributionStatus::Accepted => "accepted",
            DistributionStatus::Declined => "declined",
            DistributionStatus::Expired => "expired",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DistributionStatus::Sent | DistributionStatus::Viewed)
    }

    pub fn can_transition_to(&self, next: DistributionStatus) -> bool {
        use DistributionStatus::*;
        matches!(
            (self, next),
            (Sent, Viewed)
                | (Sent, Accepted)
                | (Sent, Declined)
                | (Sent, Expired)
                | (Viewed, Accepted)
                | (Viewed, Declined)
                | (Viewed, Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecord {
    pub id: DistributionId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub status: DistributionStatus,
    pub priority: u32,
    pub sent_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub bid_amount: Option<Decimal>,
    pub is_winner: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub final_price: Decimal,
    pub status: JobStatus,
    pub scheduled_for: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Payload handed to the notification sink for each offered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNotification {
    pub provider_id: ProviderId,
    pub lead_id: LeadId,
    pub priority: u32,
    pub estimated_response_minutes: u32,
}
