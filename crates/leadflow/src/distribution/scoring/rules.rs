use rust_decimal::prelude::ToPrimitive;

use super::super::domain::{Provider, SubscriptionTier};
use super::{LeadContext, ScoreComponent, ScoreSignal};

pub(crate) const TIER_WEIGHT: f64 = 0.4;
pub(crate) const RESPONSE_TIME_WEIGHT: f64 = 0.2;
pub(crate) const ACCEPTANCE_RATE_WEIGHT: f64 = 0.2;
pub(crate) const BID_WEIGHT: f64 = 0.1;
pub(crate) const CREDIT_WEIGHT: f64 = 0.1;
pub(crate) const URGENCY_BONUS: f64 = 20.0;

const FULL_CREDIT_BALANCE: f64 = 10.0;

/// Negative and non-finite inputs count as zero.
fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

pub(crate) fn tier_points(tier: SubscriptionTier) -> f64 {
    match tier {
        SubscriptionTier::Elite => 100.0,
        SubscriptionTier::Professional => 70.0,
        SubscriptionTier::Basic => 40.0,
    }
}

pub(crate) fn response_points(avg_response_minutes: f64) -> f64 {
    (100.0 - sanitize(avg_response_minutes)).max(0.0)
}

pub(crate) fn acceptance_points(acceptance_rate: f64) -> f64 {
    sanitize(acceptance_rate).min(100.0)
}

pub(crate) fn bid_points(provider: &Provider) -> f64 {
    if !provider.auto_bid.enabled {
        return 0.0;
    }
    let max_bid = provider
        .auto_bid
        .max_bid_amount
        .and_then(|amount| amount.to_f64())
        .map(sanitize)
        .unwrap_or(0.0);
    ((max_bid / 100.0) * 100.0).min(100.0)
}

pub(crate) fn credit_points(lead_credits: i64) -> f64 {
    let credits = lead_credits.max(0) as f64;
    (credits / FULL_CREDIT_BALANCE).min(1.0) * 100.0
}

pub(crate) fn score_provider(provider: &Provider, lead: &LeadContext) -> (Vec<ScoreComponent>, f64) {
    let mut components = vec![
        ScoreComponent::weighted(ScoreSignal::Tier, tier_points(provider.tier), TIER_WEIGHT),
        ScoreComponent::weighted(
            ScoreSignal::ResponseTime,
            response_points(provider.avg_response_minutes),
            RESPONSE_TIME_WEIGHT,
        ),
        ScoreComponent::weighted(
            ScoreSignal::AcceptanceRate,
            acceptance_points(provider.acceptance_rate),
            ACCEPTANCE_RATE_WEIGHT,
        ),
        ScoreComponent::weighted(ScoreSignal::Bid, bid_points(provider), BID_WEIGHT),
        ScoreComponent::weighted(
            ScoreSignal::Credits,
            credit_points(provider.lead_credits),
            CREDIT_WEIGHT,
        ),
    ];

    if lead.urgent && provider.tier != SubscriptionTier::Basic {
        components.push(ScoreComponent::flat(ScoreSignal::UrgencyBonus, URGENCY_BONUS));
    }

    let total = components.iter().map(|component| component.contribution).sum();
    (components, total)
}
