use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::domain::{
    DistributionId, DistributionRecord, DistributionStatus, JobRecord, Lead, LeadId,
    LeadLocation, LeadNotification, LeadStatus, ProviderCandidate, ProviderId,
};

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("lead status changed concurrently (expected {expected:?}, found {found:?})")]
    StaleLeadStatus {
        expected: LeadStatus,
        found: LeadStatus,
    },
    #[error("distribution status changed concurrently (expected {expected:?}, found {found:?})")]
    StaleDistributionStatus {
        expected: DistributionStatus,
        found: DistributionStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read side of the provider directory.
pub trait ProviderDirectory: Send + Sync {
    /// Providers that may serve the location, each with its job count for `day`.
    /// Implementations may prefilter; the eligibility rules are applied again in-core.
    fn find_eligible(
        &self,
        location: &LeadLocation,
        estimated_value: Decimal,
        day: NaiveDate,
    ) -> Result<Vec<ProviderCandidate>, RepositoryError>;
}

pub trait LeadStore: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;
    fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<(), RepositoryError>;
}

/// Writes staged inside [`DistributionLedger::transaction`]; applied together or not at all.
pub trait UnitOfWork {
    fn create_distribution(
        &mut self,
        record: DistributionRecord,
    ) -> Result<DistributionRecord, RepositoryError>;
    /// Conditional replace; a stored record not in `expected` fails with
    /// `StaleDistributionStatus`.
    fn update_distribution(
        &mut self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError>;
    fn create_job(&mut self, job: JobRecord) -> Result<JobRecord, RepositoryError>;
    /// Conditional status update; a lead not in `from` fails with `StaleLeadStatus`.
    fn transition_lead(
        &mut self,
        id: &LeadId,
        from: LeadStatus,
        to: LeadStatus,
    ) -> Result<Lead, RepositoryError>;
}

pub trait DistributionLedger: Send + Sync {
    /// Persist a fan-out batch. Pairs already offered for the lead are skipped, so only
    /// newly created records come back.
    fn insert_batch(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError>;
    fn fetch_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionRecord>, RepositoryError>;
    /// Replace the record only if the stored status is still `expected`.
    fn update_distribution(
        &self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError>;
    fn distributions_for(&self, lead_id: &LeadId)
        -> Result<Vec<DistributionRecord>, RepositoryError>;
    /// Open (`SENT`/`VIEWED`) records sent strictly before `cutoff`.
    fn open_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError>;
    fn transaction<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreditError {
    #[error("insufficient lead credits (available {available}, requested {requested})")]
    Insufficient { available: i64, requested: u32 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub trait CreditLedger: Send + Sync {
    /// Decrement the provider's balance, returning what remains.
    fn deduct(&self, provider_id: &ProviderId, amount: u32) -> Result<i64, CreditError>;
}

/// Backing store the distribution service runs against.
pub trait MarketplaceStore: ProviderDirectory + LeadStore + DistributionLedger + CreditLedger {}

impl<T> MarketplaceStore for T where
    T: ProviderDirectory + LeadStore + DistributionLedger + CreditLedger
{
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound provider notifications. Delivery is fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notifications: Vec<LeadNotification>) -> Result<(), NotificationError>;
}
