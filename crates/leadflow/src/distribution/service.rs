use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::assignment::{
    gathering_outcome, rank_bids, Assignment, AssignmentError, AssignmentResult, AssignmentRun,
    AssignmentStage,
};
use super::bidding::calculate_bid;
use super::config::{Clock, DistributionConfig, SystemClock};
use super::domain::{
    round_money, DistributionId, DistributionRecord, DistributionStatus, JobId, JobRecord,
    JobStatus, Lead, LeadId, LeadNotification, LeadStatus, LeadSubmission, ProviderId,
};
use super::eligibility::EligibilityFilter;
use super::repository::{MarketplaceStore, NotificationSink, RepositoryError};
use super::scoring::{select_recipients, LeadContext, RankedProvider, ScoringEngine};
use super::validation::{validate_submission, ValidationError};

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DISTRIBUTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

fn next_distribution_id() -> DistributionId {
    let id = DISTRIBUTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DistributionId(format!("dist-{id:06}"))
}

fn next_job_id() -> JobId {
    let id = JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    JobId(format!("job-{id:06}"))
}

/// Provider answer to an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum ProviderResponse {
    Accept {
        #[serde(default)]
        price: Option<Decimal>,
    },
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseOutcome {
    pub distribution: DistributionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<JobRecord>,
}

/// Error raised by the fan-out and offer lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error("distribution {0} not found")]
    DistributionNotFound(DistributionId),
    #[error("lead {lead_id} is {} and can no longer be distributed", .status.label())]
    LeadClosed { lead_id: LeadId, status: LeadStatus },
    #[error("distribution cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: DistributionStatus,
        to: DistributionStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Service composing eligibility, scoring, bidding, and the marketplace store.
pub struct LeadDistributionService<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    engine: ScoringEngine,
    config: DistributionConfig,
    clock: Arc<dyn Clock>,
}

impl<S, N> LeadDistributionService<S, N>
where
    S: MarketplaceStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: DistributionConfig) -> Self {
        Self {
            store,
            notifications,
            engine: ScoringEngine::new(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Validate a quote request and store it as a pending lead.
    pub fn submit_lead(&self, submission: LeadSubmission) -> Result<Lead, DistributionError> {
        validate_submission(&submission)?;

        let lead = Lead {
            id: next_lead_id(),
            location: submission.location,
            estimated_value: submission.estimated_value,
            urgent: submission.urgent,
            items: submission.items,
            status: LeadStatus::Pending,
            created_at: self.clock.now(),
        };

        let stored = self.store.insert_lead(lead)?;
        info!(lead_id = %stored.id, urgent = stored.urgent, "lead captured");
        Ok(stored)
    }

    pub fn lead(&self, lead_id: &LeadId) -> Result<Lead, DistributionError> {
        self.store
            .fetch_lead(lead_id)?
            .ok_or_else(|| DistributionError::LeadNotFound(lead_id.clone()))
    }

    /// Eligible fan-out candidates for a lead in score order, without sending anything.
    pub fn rank_candidates(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<RankedProvider>, DistributionError> {
        let lead = self.lead(lead_id)?;
        let estimate = lead
            .point_estimate()
            .ok_or(ValidationError::EstimateMissing)?;
        self.ranked_for(&lead, estimate, self.clock.now())
    }

    fn ranked_for(
        &self,
        lead: &Lead,
        estimate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedProvider>, DistributionError> {
        if !lead.location.is_addressable() {
            return Err(ValidationError::MissingLocation.into());
        }

        let candidates = self
            .store
            .find_eligible(&lead.location, estimate, now.date_naive())?;
        let report = EligibilityFilter::fan_out().apply(&lead.location, estimate, candidates);

        let context = LeadContext {
            estimated_value: estimate,
            urgent: lead.urgent,
        };
        Ok(self.engine.rank(report.eligible, &context))
    }

    /// Offer a lead to the top-ranked providers.
    ///
    /// Returns the records created by this call; providers already offered the lead are
    /// skipped. An empty result means no provider could take the lead.
    pub fn distribute_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<DistributionRecord>, DistributionError> {
        let lead = self.lead(lead_id)?;
        if !lead.status.is_distributable() {
            return Err(DistributionError::LeadClosed {
                lead_id: lead.id,
                status: lead.status,
            });
        }
        let estimate = lead
            .point_estimate()
            .ok_or(ValidationError::EstimateMissing)?;

        let now = self.clock.now();
        let ranked = self.ranked_for(&lead, estimate, now)?;
        if ranked.is_empty() {
            info!(lead_id = %lead.id, "no eligible providers for lead");
            return Ok(Vec::new());
        }

        let selected = select_recipients(ranked, estimate);
        let mut response_minutes: HashMap<ProviderId, u32> = HashMap::new();
        let records: Vec<DistributionRecord> = selected
            .into_iter()
            .map(|ranked| {
                let provider = &ranked.eligible.provider;
                response_minutes.insert(
                    provider.id.clone(),
                    provider.avg_response_minutes.max(0.0).round() as u32,
                );
                let bid_amount = match calculate_bid(&provider.auto_bid, estimate) {
                    Ok(bid) if bid.is_actionable() => Some(bid.amount),
                    Ok(_) => None,
                    Err(error) => {
                        warn!(provider_id = %provider.id, %error, "offer sent without bid");
                        None
                    }
                };
                DistributionRecord {
                    id: next_distribution_id(),
                    lead_id: lead.id.clone(),
                    provider_id: provider.id.clone(),
                    status: DistributionStatus::Sent,
                    priority: ranked.rank,
                    sent_at: now,
                    viewed_at: None,
                    responded_at: None,
                    bid_amount,
                    is_winner: false,
                }
            })
            .collect();

        let created = self.store.insert_batch(records)?;
        if created.is_empty() {
            info!(lead_id = %lead.id, "selected providers were already offered this lead");
            return Ok(created);
        }

        for record in &created {
            if let Err(error) = self
                .store
                .deduct(&record.provider_id, self.config.credits_per_distribution)
            {
                warn!(provider_id = %record.provider_id, lead_id = %lead.id, %error, "credit deduction failed");
            }
        }

        if lead.status == LeadStatus::Pending {
            if let Err(error) = self.store.update_lead_status(&lead.id, LeadStatus::Sent) {
                warn!(lead_id = %lead.id, %error, "failed to mark lead as sent");
            }
        }

        let notifications = created
            .iter()
            .map(|record| LeadNotification {
                provider_id: record.provider_id.clone(),
                lead_id: record.lead_id.clone(),
                priority: record.priority,
                estimated_response_minutes: response_minutes
                    .get(&record.provider_id)
                    .copied()
                    .unwrap_or(self.config.response_window_minutes),
            })
            .collect();
        if let Err(error) = self.notifications.notify(notifications) {
            warn!(lead_id = %lead.id, %error, "provider notification failed");
        }

        info!(lead_id = %lead.id, recipients = created.len(), "lead distributed");
        Ok(created)
    }

    /// Commit a lead directly to the best auto-bidding provider.
    pub fn auto_assign(&self, lead: &Lead) -> Result<AssignmentResult, AssignmentError> {
        let estimate = lead
            .point_estimate()
            .ok_or(ValidationError::EstimateMissing)?;
        if !lead.location.is_addressable() {
            return Err(ValidationError::MissingLocation.into());
        }

        let now = self.clock.now();
        let mut run = AssignmentRun::start(lead.id.clone());

        let candidates = self
            .store
            .find_eligible(&lead.location, estimate, now.date_naive())
            .map_err(AssignmentError::Lookup)?;
        let report = EligibilityFilter::auto_assign().apply(&lead.location, estimate, candidates);
        if let Some(reason) = gathering_outcome(&report) {
            run.advance(AssignmentStage::NoAssignment);
            info!(lead_id = %lead.id, %reason, "lead not assigned");
            return Ok(AssignmentResult::NoAssignment { reason });
        }

        run.advance(AssignmentStage::BidRanking);
        let winner = match rank_bids(report.eligible, estimate) {
            Ok(mut ranked) => ranked.swap_remove(0),
            Err(reason) => {
                run.advance(AssignmentStage::NoAssignment);
                info!(lead_id = %lead.id, %reason, "lead not assigned");
                return Ok(AssignmentResult::NoAssignment { reason });
            }
        };
        run.advance(AssignmentStage::WinnerSelected);

        let provider = winner.eligible.provider;
        let bid_amount = winner.bid.amount;
        let distribution = DistributionRecord {
            id: next_distribution_id(),
            lead_id: lead.id.clone(),
            provider_id: provider.id.clone(),
            status: DistributionStatus::Accepted,
            priority: 1,
            sent_at: now,
            viewed_at: None,
            responded_at: Some(now),
            bid_amount: Some(bid_amount),
            is_winner: true,
        };
        let job = JobRecord {
            id: next_job_id(),
            lead_id: lead.id.clone(),
            provider_id: provider.id.clone(),
            final_price: bid_amount,
            status: JobStatus::Pending,
            scheduled_for: now.date_naive(),
            created_at: now,
        };

        let (distribution, job) = self
            .store
            .transaction(|work| {
                let distribution = work.create_distribution(distribution)?;
                let job = work.create_job(job)?;
                work.transition_lead(&lead.id, LeadStatus::Pending, LeadStatus::Accepted)?;
                Ok((distribution, job))
            })
            .map_err(AssignmentError::Commit)?;
        run.advance(AssignmentStage::Committed);

        info!(
            lead_id = %lead.id,
            provider_id = %provider.id,
            bid = %bid_amount,
            stage = ?run.stage(),
            "lead auto-assigned"
        );

        Ok(AssignmentResult::Assigned(Assignment {
            lead_id: lead.id.clone(),
            provider_id: provider.id,
            provider_name: provider.business_name,
            bid_amount,
            job_id: job.id,
            distribution_id: distribution.id,
        }))
    }

    pub fn auto_assign_by_id(&self, lead_id: &LeadId) -> Result<AssignmentResult, AssignmentError> {
        let lead = self
            .store
            .fetch_lead(lead_id)
            .map_err(AssignmentError::Lookup)?
            .ok_or_else(|| AssignmentError::LeadNotFound(lead_id.clone()))?;
        self.auto_assign(&lead)
    }

    pub fn distributions_for(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<DistributionRecord>, DistributionError> {
        self.lead(lead_id)?;
        Ok(self.store.distributions_for(lead_id)?)
    }

    fn distribution(&self, id: &DistributionId) -> Result<DistributionRecord, DistributionError> {
        self.store
            .fetch_distribution(id)?
            .ok_or_else(|| DistributionError::DistributionNotFound(id.clone()))
    }

    fn ensure_transition(
        record: &DistributionRecord,
        next: DistributionStatus,
    ) -> Result<(), DistributionError> {
        if record.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DistributionError::InvalidTransition {
                from: record.status,
                to: next,
            })
        }
    }

    /// Record that the provider opened the offer. Repeated views are no-ops.
    pub fn mark_viewed(&self, id: &DistributionId) -> Result<DistributionRecord, DistributionError> {
        let mut record = self.distribution(id)?;
        if record.status == DistributionStatus::Viewed {
            return Ok(record);
        }
        Self::ensure_transition(&record, DistributionStatus::Viewed)?;

        let previous = record.status;
        record.status = DistributionStatus::Viewed;
        record.viewed_at = Some(self.clock.now());
        self.store.update_distribution(record.clone(), previous)?;
        Ok(record)
    }

    /// Apply a provider's accept or decline to an open offer.
    ///
    /// Accepting books the job and closes the lead in one commit, so only the first
    /// provider to accept wins.
    pub fn respond(
        &self,
        id: &DistributionId,
        response: ProviderResponse,
    ) -> Result<ResponseOutcome, DistributionError> {
        let mut record = self.distribution(id)?;
        let previous = record.status;
        let now = self.clock.now();

        match response {
            ProviderResponse::Decline => {
                Self::ensure_transition(&record, DistributionStatus::Declined)?;
                record.status = DistributionStatus::Declined;
                record.responded_at = Some(now);
                self.store.update_distribution(record.clone(), previous)?;
                info!(distribution_id = %record.id, lead_id = %record.lead_id, "offer declined");
                Ok(ResponseOutcome {
                    distribution: record,
                    job: None,
                })
            }
            ProviderResponse::Accept { price } => {
                Self::ensure_transition(&record, DistributionStatus::Accepted)?;
                let lead = self.lead(&record.lead_id)?;
                let price = match price.or(record.bid_amount).or(lead.point_estimate()) {
                    Some(price) if price > Decimal::ZERO => round_money(price),
                    Some(price) => return Err(ValidationError::NonPositivePrice(price).into()),
                    None => return Err(ValidationError::EstimateMissing.into()),
                };

                record.status = DistributionStatus::Accepted;
                record.responded_at = Some(now);
                let job = JobRecord {
                    id: next_job_id(),
                    lead_id: record.lead_id.clone(),
                    provider_id: record.provider_id.clone(),
                    final_price: price,
                    status: JobStatus::Pending,
                    scheduled_for: now.date_naive(),
                    created_at: now,
                };

                let job = self.store.transaction(|work| {
                    work.update_distribution(record.clone(), previous)?;
                    let job = work.create_job(job)?;
                    work.transition_lead(&record.lead_id, LeadStatus::Sent, LeadStatus::Accepted)?;
                    Ok(job)
                })?;

                info!(
                    distribution_id = %record.id,
                    lead_id = %record.lead_id,
                    provider_id = %record.provider_id,
                    price = %price,
                    "offer accepted"
                );
                Ok(ResponseOutcome {
                    distribution: record,
                    job: Some(job),
                })
            }
        }
    }

    /// Expire open offers older than the response window.
    pub fn expire_stale(&self) -> Result<Vec<DistributionRecord>, DistributionError> {
        let cutoff = self.clock.now() - self.config.response_window();
        let mut expired = Vec::new();

        for mut record in self.store.open_sent_before(cutoff)? {
            let previous = record.status;
            record.status = DistributionStatus::Expired;
            match self.store.update_distribution(record.clone(), previous) {
                Ok(()) => expired.push(record),
                Err(RepositoryError::StaleDistributionStatus { found, .. }) => {
                    debug!(distribution_id = %record.id, status = found.label(), "offer answered before expiry");
                }
                Err(error) => return Err(error.into()),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired stale offers");
        }
        Ok(expired)
    }
}
