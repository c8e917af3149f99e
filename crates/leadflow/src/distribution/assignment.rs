//! Single-winner assignment: gather auto-bidding candidates, price them, pick the
//! cheapest, and commit the job.
//!
//! Winner order: lowest bid, then a primary service-area match, then higher rating, then
//! more completed jobs.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::bidding::{calculate_bid, Bid};
use super::domain::{DistributionId, JobId, LeadId, ProviderId};
use super::eligibility::{EligibilityReport, EligibleProvider};
use super::repository::RepositoryError;
use super::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStage {
    CandidateGathering,
    BidRanking,
    WinnerSelected,
    Committed,
    NoAssignment,
}

impl AssignmentStage {
    pub fn can_advance_to(&self, next: AssignmentStage) -> bool {
        use AssignmentStage::*;
        matches!(
            (self, next),
            (CandidateGathering, BidRanking)
                | (CandidateGathering, NoAssignment)
                | (BidRanking, WinnerSelected)
                | (BidRanking, NoAssignment)
                | (WinnerSelected, Committed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStage::Committed | AssignmentStage::NoAssignment)
    }
}

/// Tracks one assignment attempt through its stages.
#[derive(Debug)]
pub(crate) struct AssignmentRun {
    lead_id: LeadId,
    stage: AssignmentStage,
}

impl AssignmentRun {
    pub(crate) fn start(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            stage: AssignmentStage::CandidateGathering,
        }
    }

    pub(crate) fn stage(&self) -> AssignmentStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, next: AssignmentStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal assignment transition {:?} -> {:?}",
            self.stage,
            next
        );
        debug!(lead_id = %self.lead_id, from = ?self.stage, to = ?next, "assignment stage");
        self.stage = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoAssignmentReason {
    NoEligibleProviders,
    AllProvidersAtCapacity,
}

impl fmt::Display for NoAssignmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoAssignmentReason::NoEligibleProviders => f.write_str("no eligible providers"),
            NoAssignmentReason::AllProvidersAtCapacity => f.write_str("all providers at capacity"),
        }
    }
}

/// Reason to stop after candidate gathering, if any.
pub(crate) fn gathering_outcome(report: &EligibilityReport) -> Option<NoAssignmentReason> {
    if !report.eligible.is_empty() {
        None
    } else if report.blocked_by_capacity() {
        Some(NoAssignmentReason::AllProvidersAtCapacity)
    } else {
        Some(NoAssignmentReason::NoEligibleProviders)
    }
}

/// Eligible provider priced for the lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidCandidate {
    pub bid: Bid,
    pub eligible: EligibleProvider,
}

fn winner_order(left: &BidCandidate, right: &BidCandidate) -> Ordering {
    left.bid
        .amount
        .cmp(&right.bid.amount)
        .then_with(|| {
            right
                .eligible
                .in_primary_area()
                .cmp(&left.eligible.in_primary_area())
        })
        .then_with(|| {
            right
                .eligible
                .provider
                .rating
                .total_cmp(&left.eligible.provider.rating)
        })
        .then_with(|| {
            right
                .eligible
                .provider
                .total_jobs
                .cmp(&left.eligible.provider.total_jobs)
        })
}

/// Price every candidate and order them winner first.
///
/// Providers whose bid settings are invalid are dropped with a warning instead of
/// failing the whole batch. Capacity is re-checked after pricing.
pub fn rank_bids(
    eligible: Vec<EligibleProvider>,
    estimated_value: Decimal,
) -> Result<Vec<BidCandidate>, NoAssignmentReason> {
    let priced: Vec<BidCandidate> = eligible
        .into_iter()
        .filter_map(|candidate| {
            match calculate_bid(&candidate.provider.auto_bid, estimated_value) {
                Ok(bid) => Some(BidCandidate {
                    bid,
                    eligible: candidate,
                }),
                Err(error) => {
                    warn!(provider_id = %candidate.provider.id, %error, "skipping provider with invalid bid settings");
                    None
                }
            }
        })
        .collect();

    if priced.is_empty() {
        return Err(NoAssignmentReason::NoEligibleProviders);
    }

    let mut ranked: Vec<BidCandidate> = priced
        .into_iter()
        .filter(|candidate| candidate.eligible.has_capacity())
        .collect();

    if ranked.is_empty() {
        return Err(NoAssignmentReason::AllProvidersAtCapacity);
    }

    ranked.sort_by(winner_order);
    Ok(ranked)
}

/// Committed assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub lead_id: LeadId,
    pub provider_id: ProviderId,
    pub provider_name: String,
    pub bid_amount: Decimal,
    pub job_id: JobId,
    pub distribution_id: DistributionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AssignmentResult {
    Assigned(Assignment),
    NoAssignment { reason: NoAssignmentReason },
}

impl AssignmentResult {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            AssignmentResult::Assigned(assignment) => Some(assignment),
            AssignmentResult::NoAssignment { .. } => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            AssignmentResult::Assigned(assignment) => format!(
                "assigned to {} at {}",
                assignment.provider_name, assignment.bid_amount
            ),
            AssignmentResult::NoAssignment { reason } => reason.to_string(),
        }
    }
}

/// Failures that abort an assignment. The lead is left as it was.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),
    #[error("provider lookup failed: {0}")]
    Lookup(#[source] RepositoryError),
    #[error("commit failure: {0}")]
    Commit(#[source] RepositoryError),
}
