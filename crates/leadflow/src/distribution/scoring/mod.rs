mod policy;
mod rules;

pub use policy::{recipient_count, select_recipients};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Provider, ProviderId};
use super::eligibility::EligibleProvider;

/// Lead attributes the scorer looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadContext {
    pub estimated_value: Decimal,
    pub urgent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSignal {
    Tier,
    ResponseTime,
    AcceptanceRate,
    Bid,
    Credits,
    UrgencyBonus,
}

/// One signal's share of the composite score, kept for audit trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub signal: ScoreSignal,
    pub points: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl ScoreComponent {
    fn weighted(signal: ScoreSignal, points: f64, weight: f64) -> Self {
        Self {
            signal,
            points,
            weight,
            contribution: points * weight,
        }
    }

    fn flat(signal: ScoreSignal, points: f64) -> Self {
        Self {
            signal,
            points,
            weight: 1.0,
            contribution: points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderScore {
    pub provider_id: ProviderId,
    pub total: f64,
    pub components: Vec<ScoreComponent>,
}

/// Eligible provider annotated with its score and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedProvider {
    pub rank: u32,
    pub score: ProviderScore,
    pub eligible: EligibleProvider,
}

/// Stateless scorer applying the fixed signal weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, provider: &Provider, lead: &LeadContext) -> ProviderScore {
        let (components, total) = rules::score_provider(provider, lead);
        ProviderScore {
            provider_id: provider.id.clone(),
            total,
            components,
        }
    }

    /// Highest score first. Equal scores keep their input order.
    pub fn rank(&self, eligible: Vec<EligibleProvider>, lead: &LeadContext) -> Vec<RankedProvider> {
        let mut scored: Vec<(ProviderScore, EligibleProvider)> = eligible
            .into_iter()
            .map(|candidate| (self.score(&candidate.provider, lead), candidate))
            .collect();

        scored.sort_by(|(left, _), (right, _)| right.total.total_cmp(&left.total));

        scored
            .into_iter()
            .zip(1u32..)
            .map(|((score, eligible), rank)| RankedProvider {
                rank,
                score,
                eligible,
            })
            .collect()
    }
}
