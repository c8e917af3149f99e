//! Lead distribution: eligibility, scoring, bidding, fan-out, and auto-assignment.
//!
//! Quotes captured on the intake form become leads. A lead is either offered to the
//! best-scoring providers in its service area (fan-out) or committed straight to the
//! cheapest auto-bidding provider (auto-assignment).

pub mod assignment;
pub mod bidding;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod memory;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use assignment::{
    Assignment, AssignmentError, AssignmentResult, AssignmentStage, BidCandidate,
    NoAssignmentReason,
};
pub use bidding::{calculate_bid, Bid, BidBasis};
pub use config::{Clock, DistributionConfig, FixedClock, SystemClock};
pub use domain::{
    AutoBidSettings, BidStrategy, DistributionId, DistributionRecord, DistributionStatus,
    EstimatedValue, JobId, JobRecord, JobStatus, Lead, LeadId, LeadItem, LeadLocation,
    LeadNotification, LeadStatus, LeadSubmission, Provider, ProviderCandidate, ProviderId,
    ProviderStatus, ServiceArea, SubscriptionTier,
};
pub use eligibility::{
    DistributionPath, EligibilityFilter, EligibilityReport, EligibleProvider, Ineligibility,
};
pub use memory::{InMemoryMarketplace, LoggingNotificationSink, RecordingNotificationSink};
pub use repository::{
    CreditError, CreditLedger, DistributionLedger, LeadStore, MarketplaceStore,
    NotificationError, NotificationSink, ProviderDirectory, RepositoryError, UnitOfWork,
};
pub use router::distribution_router;
pub use scoring::{
    recipient_count, select_recipients, LeadContext, ProviderScore, RankedProvider,
    ScoreComponent, ScoreSignal, ScoringEngine,
};
pub use service::{DistributionError, LeadDistributionService, ProviderResponse, ResponseOutcome};
pub use validation::ValidationError;
