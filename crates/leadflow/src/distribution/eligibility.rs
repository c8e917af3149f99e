use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::domain::{
    LeadLocation, Provider, ProviderCandidate, ProviderId, ProviderStatus, ServiceArea,
};

/// Which distribution path the filter is gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionPath {
    /// Offers go to several providers and cost a lead credit each.
    FanOut,
    /// A single provider is committed to; requires auto-bid instead of credits.
    AutoAssign,
}

/// Why a candidate was left out. Capacity is checked last, so `AtCapacity` implies every
/// other rule passed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum Ineligibility {
    Duplicate,
    Inactive { status: ProviderStatus },
    NoCredits { credits: i64 },
    AutoBidDisabled,
    OutsideServiceArea,
    BelowMinimumValue { minimum: Decimal },
    AboveMaximumValue { maximum: Decimal },
    AtCapacity { jobs_today: u32, max_jobs_per_day: u32 },
}

/// Provider that passed every rule, with the service area it matched on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibleProvider {
    pub provider: Provider,
    pub jobs_today: u32,
    pub matched_area: ServiceArea,
}

impl EligibleProvider {
    pub fn in_primary_area(&self) -> bool {
        self.matched_area.is_primary
    }

    pub fn has_capacity(&self) -> bool {
        self.provider.auto_bid.has_capacity(self.jobs_today)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EligibilityReport {
    pub eligible: Vec<EligibleProvider>,
    pub excluded: Vec<(ProviderId, Ineligibility)>,
}

impl EligibilityReport {
    /// True when nobody is eligible and at least one provider failed only on its daily job
    /// cap. Capacity is checked last, so such a provider passed every other rule.
    pub fn blocked_by_capacity(&self) -> bool {
        self.eligible.is_empty()
            && self
                .excluded
                .iter()
                .any(|(_, reason)| matches!(reason, Ineligibility::AtCapacity { .. }))
    }
}

/// Pure filter over the provider directory.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter {
    path: DistributionPath,
}

impl EligibilityFilter {
    pub fn new(path: DistributionPath) -> Self {
        Self { path }
    }

    pub fn fan_out() -> Self {
        Self::new(DistributionPath::FanOut)
    }

    pub fn auto_assign() -> Self {
        Self::new(DistributionPath::AutoAssign)
    }

    pub fn path(&self) -> DistributionPath {
        self.path
    }

    /// Partition candidates into eligible and excluded. Input order is preserved and a
    /// provider appearing twice is only considered once.
    pub fn apply(
        &self,
        location: &LeadLocation,
        estimated_value: Decimal,
        candidates: Vec<ProviderCandidate>,
    ) -> EligibilityReport {
        let mut seen = HashSet::new();
        let mut report = EligibilityReport::default();

        for candidate in candidates {
            let provider_id = candidate.provider.id.clone();
            let verdict = if seen.insert(provider_id.clone()) {
                self.check(location, estimated_value, &candidate)
            } else {
                Err(Ineligibility::Duplicate)
            };

            match verdict {
                Ok(matched_area) => report.eligible.push(EligibleProvider {
                    provider: candidate.provider,
                    jobs_today: candidate.jobs_today,
                    matched_area,
                }),
                Err(reason) => {
                    debug!(provider_id = %provider_id, ?reason, path = ?self.path, "provider excluded");
                    report.excluded.push((provider_id, reason));
                }
            }
        }

        report
    }

    /// Evaluate one candidate, returning the service area it matched on.
    pub fn check(
        &self,
        location: &LeadLocation,
        estimated_value: Decimal,
        candidate: &ProviderCandidate,
    ) -> Result<ServiceArea, Ineligibility> {
        let provider = &candidate.provider;

        if provider.status != ProviderStatus::Active {
            return Err(Ineligibility::Inactive {
                status: provider.status,
            });
        }

        match self.path {
            DistributionPath::FanOut if provider.lead_credits <= 0 => {
                return Err(Ineligibility::NoCredits {
                    credits: provider.lead_credits,
                });
            }
            DistributionPath::AutoAssign if !provider.auto_bid.enabled => {
                return Err(Ineligibility::AutoBidDisabled);
            }
            _ => {}
        }

        let matched_area = provider
            .matched_area(location)
            .cloned()
            .ok_or(Ineligibility::OutsideServiceArea)?;

        let settings = &provider.auto_bid;
        if let Some(minimum) = settings.min_job_value.filter(|min| estimated_value < *min) {
            return Err(Ineligibility::BelowMinimumValue { minimum });
        }
        if let Some(maximum) = settings.max_job_value.filter(|max| estimated_value > *max) {
            return Err(Ineligibility::AboveMaximumValue { maximum });
        }

        if !settings.has_capacity(candidate.jobs_today) {
            return Err(Ineligibility::AtCapacity {
                jobs_today: candidate.jobs_today,
                max_jobs_per_day: settings.max_jobs_per_day.unwrap_or_default(),
            });
        }

        Ok(matched_area)
    }
}
