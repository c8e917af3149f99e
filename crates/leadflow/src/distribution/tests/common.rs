use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::distribution::domain::{
    AutoBidSettings, BidStrategy, DistributionId, DistributionRecord, DistributionStatus,
    EstimatedValue, JobRecord, Lead, LeadId, LeadItem, LeadLocation, LeadNotification,
    LeadStatus, LeadSubmission, Provider, ProviderCandidate, ProviderId, ProviderStatus,
    ServiceArea, SubscriptionTier,
};
use crate::distribution::memory::{InMemoryMarketplace, RecordingNotificationSink};
use crate::distribution::repository::{
    CreditError, CreditLedger, DistributionLedger, LeadStore, NotificationError,
    NotificationSink, ProviderDirectory, RepositoryError, UnitOfWork,
};
use crate::distribution::{DistributionConfig, FixedClock, LeadDistributionService};

pub(super) const ZIP: &str = "78701";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 15, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn today() -> NaiveDate {
    now().date_naive()
}

pub(super) fn area(zip: &str, primary: bool) -> ServiceArea {
    ServiceArea {
        zip_code: zip.to_string(),
        city: Some("Austin".to_string()),
        state: Some("TX".to_string()),
        is_primary: primary,
    }
}

pub(super) fn provider(id: &str, tier: SubscriptionTier) -> Provider {
    Provider {
        id: ProviderId(id.to_string()),
        business_name: format!("{id} Junk Removal"),
        status: ProviderStatus::Active,
        tier,
        service_areas: vec![area(ZIP, false)],
        lead_credits: 20,
        avg_response_minutes: 30.0,
        acceptance_rate: 70.0,
        rating: 4.5,
        total_jobs: 50,
        auto_bid: AutoBidSettings {
            max_jobs_per_day: Some(4),
            ..AutoBidSettings::default()
        },
    }
}

pub(super) fn fixed_bidder(id: &str, amount: Decimal) -> Provider {
    let mut provider = provider(id, SubscriptionTier::Professional);
    provider.auto_bid = AutoBidSettings {
        enabled: true,
        strategy: Some(BidStrategy::FixedAmount),
        fixed_amount: Some(amount),
        max_bid_amount: Some(amount),
        max_jobs_per_day: Some(4),
        ..AutoBidSettings::default()
    };
    provider
}

pub(super) fn percentage_bidder(id: &str, percentage: Decimal) -> Provider {
    let mut provider = provider(id, SubscriptionTier::Elite);
    provider.auto_bid = AutoBidSettings {
        enabled: true,
        strategy: Some(BidStrategy::PercentageBelow),
        percentage: Some(percentage),
        max_bid_amount: Some(dec!(75)),
        max_jobs_per_day: Some(4),
        ..AutoBidSettings::default()
    };
    provider
}

pub(super) fn candidate(provider: Provider) -> ProviderCandidate {
    ProviderCandidate {
        provider,
        jobs_today: 0,
    }
}

pub(super) fn submission(estimate: Decimal) -> LeadSubmission {
    LeadSubmission {
        location: LeadLocation::zip(ZIP),
        estimated_value: Some(EstimatedValue::Amount(estimate)),
        urgent: false,
        items: vec![
            LeadItem {
                item_type: "couch".to_string(),
                quantity: 1,
            },
            LeadItem {
                item_type: "mattress".to_string(),
                quantity: 2,
            },
        ],
    }
}

pub(super) fn lead(id: &str, estimate: Decimal) -> Lead {
    let submission = submission(estimate);
    Lead {
        id: LeadId(id.to_string()),
        location: submission.location,
        estimated_value: submission.estimated_value,
        urgent: submission.urgent,
        items: submission.items,
        status: LeadStatus::Pending,
        created_at: now(),
    }
}

pub(super) fn booked_job(id: &str, lead_id: &LeadId, provider_id: &str) -> JobRecord {
    JobRecord {
        id: crate::distribution::JobId(id.to_string()),
        lead_id: lead_id.clone(),
        provider_id: ProviderId(provider_id.to_string()),
        final_price: dec!(300),
        status: crate::distribution::JobStatus::Scheduled,
        scheduled_for: today(),
        created_at: now(),
    }
}

pub(super) fn marketplace(providers: Vec<Provider>) -> Arc<InMemoryMarketplace> {
    let store = Arc::new(InMemoryMarketplace::new());
    for provider in providers {
        store.upsert_provider(provider).expect("seed provider");
    }
    store
}

pub(super) fn build_service<S>(
    store: Arc<S>,
) -> (
    LeadDistributionService<S, RecordingNotificationSink>,
    Arc<RecordingNotificationSink>,
)
where
    S: crate::distribution::MarketplaceStore + 'static,
{
    let notifications = Arc::new(RecordingNotificationSink::default());
    let service = LeadDistributionService::new(
        store,
        notifications.clone(),
        DistributionConfig::default(),
    )
    .with_clock(Arc::new(FixedClock(now())));
    (service, notifications)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Wraps the in-memory marketplace and injects failures at chosen points.
#[derive(Default)]
pub(super) struct FaultyMarketplace {
    pub(super) inner: InMemoryMarketplace,
    pub(super) fail_job_creation: AtomicBool,
    pub(super) fail_credit_deduction: AtomicBool,
}

impl FaultyMarketplace {
    pub(super) fn wrapping(inner: &InMemoryMarketplace) -> Self {
        Self {
            inner: inner.clone(),
            ..Self::default()
        }
    }
}

struct FailingJobs<'a> {
    inner: &'a mut dyn UnitOfWork,
}

impl UnitOfWork for FailingJobs<'_> {
    fn create_distribution(
        &mut self,
        record: DistributionRecord,
    ) -> Result<DistributionRecord, RepositoryError> {
        self.inner.create_distribution(record)
    }

    fn update_distribution(
        &mut self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.update_distribution(record, expected)
    }

    fn create_job(&mut self, _job: JobRecord) -> Result<JobRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("jobs table locked".to_string()))
    }

    fn transition_lead(
        &mut self,
        id: &LeadId,
        from: LeadStatus,
        to: LeadStatus,
    ) -> Result<Lead, RepositoryError> {
        self.inner.transition_lead(id, from, to)
    }
}

impl ProviderDirectory for FaultyMarketplace {
    fn find_eligible(
        &self,
        location: &LeadLocation,
        estimated_value: Decimal,
        day: NaiveDate,
    ) -> Result<Vec<ProviderCandidate>, RepositoryError> {
        self.inner.find_eligible(location, estimated_value, day)
    }
}

impl LeadStore for FaultyMarketplace {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.inner.insert_lead(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch_lead(id)
    }

    fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<(), RepositoryError> {
        self.inner.update_lead_status(id, status)
    }
}

impl DistributionLedger for FaultyMarketplace {
    fn insert_batch(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.insert_batch(records)
    }

    fn fetch_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionRecord>, RepositoryError> {
        self.inner.fetch_distribution(id)
    }

    fn update_distribution(
        &self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        self.inner.update_distribution(record, expected)
    }

    fn distributions_for(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.distributions_for(lead_id)
    }

    fn open_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.open_sent_before(cutoff)
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, RepositoryError>,
    {
        if self.fail_job_creation.load(Ordering::SeqCst) {
            self.inner
                .transaction(|staged| work(&mut FailingJobs { inner: staged }))
        } else {
            self.inner.transaction(work)
        }
    }
}

impl CreditLedger for FaultyMarketplace {
    fn deduct(&self, provider_id: &ProviderId, amount: u32) -> Result<i64, CreditError> {
        if self.fail_credit_deduction.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("billing offline".to_string()).into());
        }
        self.inner.deduct(provider_id, amount)
    }
}

/// Sink whose transport is always down.
#[derive(Default)]
pub(super) struct BrokenNotifications;

impl NotificationSink for BrokenNotifications {
    fn notify(&self, _notifications: Vec<LeadNotification>) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay refused".to_string()))
    }
}

type Interleaved = Box<dyn FnOnce() + Send>;

/// Runs another writer's work once, just before the next distribution write lands.
pub(super) struct InterleavingMarketplace {
    pub(super) inner: InMemoryMarketplace,
    before_write: Mutex<Option<Interleaved>>,
}

impl InterleavingMarketplace {
    pub(super) fn wrapping(inner: &InMemoryMarketplace) -> Self {
        Self {
            inner: inner.clone(),
            before_write: Mutex::new(None),
        }
    }

    pub(super) fn before_next_write(&self, work: impl FnOnce() + Send + 'static) {
        *self.before_write.lock().expect("hook mutex") = Some(Box::new(work));
    }

    fn interleave(&self) {
        let pending = self.before_write.lock().expect("hook mutex").take();
        if let Some(work) = pending {
            work();
        }
    }
}

impl ProviderDirectory for InterleavingMarketplace {
    fn find_eligible(
        &self,
        location: &LeadLocation,
        estimated_value: Decimal,
        day: NaiveDate,
    ) -> Result<Vec<ProviderCandidate>, RepositoryError> {
        self.inner.find_eligible(location, estimated_value, day)
    }
}

impl LeadStore for InterleavingMarketplace {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        self.inner.insert_lead(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        self.inner.fetch_lead(id)
    }

    fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<(), RepositoryError> {
        self.inner.update_lead_status(id, status)
    }
}

impl DistributionLedger for InterleavingMarketplace {
    fn insert_batch(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.insert_batch(records)
    }

    fn fetch_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionRecord>, RepositoryError> {
        self.inner.fetch_distribution(id)
    }

    fn update_distribution(
        &self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        self.interleave();
        self.inner.update_distribution(record, expected)
    }

    fn distributions_for(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.distributions_for(lead_id)
    }

    fn open_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        self.inner.open_sent_before(cutoff)
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, RepositoryError>,
    {
        self.interleave();
        self.inner.transaction(work)
    }
}

impl CreditLedger for InterleavingMarketplace {
    fn deduct(&self, provider_id: &ProviderId, amount: u32) -> Result<i64, CreditError> {
        self.inner.deduct(provider_id, amount)
    }
}
