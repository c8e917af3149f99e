use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::domain::{
    DistributionId, DistributionRecord, DistributionStatus, JobId, JobRecord, JobStatus, Lead,
    LeadId, LeadLocation, LeadNotification, LeadStatus, Provider, ProviderCandidate, ProviderId,
};
use super::repository::{
    CreditError, CreditLedger, DistributionLedger, LeadStore, NotificationError,
    NotificationSink, ProviderDirectory, RepositoryError, UnitOfWork,
};

#[derive(Debug, Clone, Default)]
struct MarketplaceState {
    providers: BTreeMap<ProviderId, Provider>,
    leads: HashMap<LeadId, Lead>,
    distributions: BTreeMap<DistributionId, DistributionRecord>,
    jobs: BTreeMap<JobId, JobRecord>,
}

impl MarketplaceState {
    fn has_pair(&self, lead_id: &LeadId, provider_id: &ProviderId) -> bool {
        self.distributions
            .values()
            .any(|record| &record.lead_id == lead_id && &record.provider_id == provider_id)
    }

    fn has_winner(&self, lead_id: &LeadId) -> bool {
        self.distributions
            .values()
            .any(|record| &record.lead_id == lead_id && record.is_winner)
    }

    fn jobs_on(&self, provider_id: &ProviderId, day: NaiveDate) -> u32 {
        self.jobs
            .values()
            .filter(|job| {
                &job.provider_id == provider_id
                    && job.scheduled_for == day
                    && job.status != JobStatus::Cancelled
            })
            .count() as u32
    }

    fn insert_distribution(
        &mut self,
        record: DistributionRecord,
    ) -> Result<DistributionRecord, RepositoryError> {
        if !self.leads.contains_key(&record.lead_id)
            || !self.providers.contains_key(&record.provider_id)
        {
            return Err(RepositoryError::NotFound);
        }
        if self.distributions.contains_key(&record.id)
            || self.has_pair(&record.lead_id, &record.provider_id)
            || (record.is_winner && self.has_winner(&record.lead_id))
        {
            return Err(RepositoryError::Conflict);
        }
        self.distributions.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn replace_distribution(
        &mut self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        let found = self
            .distributions
            .get(&record.id)
            .map(|existing| existing.status)
            .ok_or(RepositoryError::NotFound)?;
        if found != expected {
            return Err(RepositoryError::StaleDistributionStatus { expected, found });
        }
        if record.is_winner
            && self.distributions.values().any(|existing| {
                existing.lead_id == record.lead_id && existing.is_winner && existing.id != record.id
            })
        {
            return Err(RepositoryError::Conflict);
        }
        self.distributions.insert(record.id.clone(), record);
        Ok(())
    }

    fn insert_job(&mut self, job: JobRecord) -> Result<JobRecord, RepositoryError> {
        if !self.leads.contains_key(&job.lead_id) || !self.providers.contains_key(&job.provider_id)
        {
            return Err(RepositoryError::NotFound);
        }
        if self.jobs.contains_key(&job.id) {
            return Err(RepositoryError::Conflict);
        }
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }
}

/// Mutex-guarded store implementing every marketplace trait. Transactions run against a
/// staged copy of the state that replaces the live state only when the work succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketplace {
    state: Arc<Mutex<MarketplaceState>>,
}

impl InMemoryMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MarketplaceState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("marketplace state poisoned".to_string()))
    }

    pub fn upsert_provider(&self, provider: Provider) -> Result<(), RepositoryError> {
        self.lock()?.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    pub fn provider(&self, id: &ProviderId) -> Result<Option<Provider>, RepositoryError> {
        Ok(self.lock()?.providers.get(id).cloned())
    }

    /// Book a job directly, bypassing assignment. Used to load existing schedules.
    pub fn record_job(&self, job: JobRecord) -> Result<JobRecord, RepositoryError> {
        self.lock()?.insert_job(job)
    }

    pub fn jobs_for_lead(&self, lead_id: &LeadId) -> Result<Vec<JobRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|job| &job.lead_id == lead_id)
            .cloned()
            .collect())
    }
}

impl ProviderDirectory for InMemoryMarketplace {
    fn find_eligible(
        &self,
        location: &LeadLocation,
        _estimated_value: Decimal,
        day: NaiveDate,
    ) -> Result<Vec<ProviderCandidate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .providers
            .values()
            .filter(|provider| provider.matched_area(location).is_some())
            .map(|provider| ProviderCandidate {
                provider: provider.clone(),
                jobs_today: state.jobs_on(&provider.id, day),
            })
            .collect())
    }
}

impl LeadStore for InMemoryMarketplace {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut state = self.lock()?;
        if state.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        state.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.lock()?.leads.get(id).cloned())
    }

    fn update_lead_status(&self, id: &LeadId, status: LeadStatus) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let lead = state.leads.get_mut(id).ok_or(RepositoryError::NotFound)?;
        lead.status = status;
        Ok(())
    }
}

struct StagedWork<'a> {
    state: &'a mut MarketplaceState,
}

impl UnitOfWork for StagedWork<'_> {
    fn create_distribution(
        &mut self,
        record: DistributionRecord,
    ) -> Result<DistributionRecord, RepositoryError> {
        self.state.insert_distribution(record)
    }

    fn update_distribution(
        &mut self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        self.state.replace_distribution(record, expected)
    }

    fn create_job(&mut self, job: JobRecord) -> Result<JobRecord, RepositoryError> {
        self.state.insert_job(job)
    }

    fn transition_lead(
        &mut self,
        id: &LeadId,
        from: LeadStatus,
        to: LeadStatus,
    ) -> Result<Lead, RepositoryError> {
        let lead = self.state.leads.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if lead.status != from {
            return Err(RepositoryError::StaleLeadStatus {
                expected: from,
                found: lead.status,
            });
        }
        lead.status = to;
        Ok(lead.clone())
    }
}

impl DistributionLedger for InMemoryMarketplace {
    fn insert_batch(
        &self,
        records: Vec<DistributionRecord>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        let mut live = self.lock()?;
        let mut staged = live.clone();
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            if staged.has_pair(&record.lead_id, &record.provider_id) {
                continue;
            }
            created.push(staged.insert_distribution(record)?);
        }
        *live = staged;
        Ok(created)
    }

    fn fetch_distribution(
        &self,
        id: &DistributionId,
    ) -> Result<Option<DistributionRecord>, RepositoryError> {
        Ok(self.lock()?.distributions.get(id).cloned())
    }

    fn update_distribution(
        &self,
        record: DistributionRecord,
        expected: DistributionStatus,
    ) -> Result<(), RepositoryError> {
        self.lock()?.replace_distribution(record, expected)
    }

    fn distributions_for(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        let mut records: Vec<_> = self
            .lock()?
            .distributions
            .values()
            .filter(|record| &record.lead_id == lead_id)
            .cloned()
            .collect();
        records.sort_by(|left, right| {
            left.sent_at
                .cmp(&right.sent_at)
                .then(left.priority.cmp(&right.priority))
        });
        Ok(records)
    }

    fn open_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DistributionRecord>, RepositoryError> {
        Ok(self
            .lock()?
            .distributions
            .values()
            .filter(|record| record.status.is_open() && record.sent_at < cutoff)
            .cloned()
            .collect())
    }

    fn transaction<T, F>(&self, work: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, RepositoryError>,
    {
        let mut live = self.lock()?;
        let mut staged = live.clone();
        let output = work(&mut StagedWork { state: &mut staged })?;
        *live = staged;
        Ok(output)
    }
}

impl CreditLedger for InMemoryMarketplace {
    fn deduct(&self, provider_id: &ProviderId, amount: u32) -> Result<i64, CreditError> {
        let mut state = self.lock()?;
        let provider = state
            .providers
            .get_mut(provider_id)
            .ok_or(RepositoryError::NotFound)?;
        if provider.lead_credits < i64::from(amount) {
            return Err(CreditError::Insufficient {
                available: provider.lead_credits,
                requested: amount,
            });
        }
        provider.lead_credits -= i64::from(amount);
        Ok(provider.lead_credits)
    }
}

/// Notification sink that keeps every delivered notification for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    delivered: Arc<Mutex<Vec<LeadNotification>>>,
}

impl RecordingNotificationSink {
    pub fn delivered(&self) -> Vec<LeadNotification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, notifications: Vec<LeadNotification>) -> Result<(), NotificationError> {
        self.delivered
            .lock()
            .map_err(|_| NotificationError::Transport("recorder poisoned".to_string()))?
            .extend(notifications);
        Ok(())
    }
}

/// Stand-in transport that writes each notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, notifications: Vec<LeadNotification>) -> Result<(), NotificationError> {
        for notification in notifications {
            info!(
                provider_id = %notification.provider_id,
                lead_id = %notification.lead_id,
                priority = notification.priority,
                eta_minutes = notification.estimated_response_minutes,
                "lead offer notification"
            );
        }
        Ok(())
    }
}
