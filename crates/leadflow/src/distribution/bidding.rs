use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::domain::{round_money, AutoBidSettings, BidStrategy};
use super::validation::ValidationError;

const MAX_PERCENTAGE_BELOW: Decimal = dec!(50);

/// How a bid amount was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "basis")]
pub enum BidBasis {
    PercentageBelow { percentage: Decimal },
    FixedAmount,
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub amount: Decimal,
    pub basis: BidBasis,
}

impl Bid {
    fn at_estimate(estimate: Decimal) -> Self {
        Self {
            amount: round_money(estimate),
            basis: BidBasis::Estimate,
        }
    }

    /// Bids priced at the estimate only feed scoring; they are not offers.
    pub fn is_actionable(&self) -> bool {
        !matches!(self.basis, BidBasis::Estimate)
    }
}

/// Derive a provider's bid for a lead from its auto-bid settings.
///
/// Invalid settings are reported rather than clamped. Disabled auto-bid, or an enabled
/// configuration without a strategy, yields a bid at the estimate.
pub fn calculate_bid(settings: &AutoBidSettings, estimate: Decimal) -> Result<Bid, ValidationError> {
    if !settings.enabled {
        return Ok(Bid::at_estimate(estimate));
    }

    match settings.strategy {
        Some(BidStrategy::PercentageBelow) => {
            let percentage = settings
                .percentage
                .ok_or(ValidationError::MissingPercentage)?;
            if percentage < Decimal::ZERO || percentage > MAX_PERCENTAGE_BELOW {
                return Err(ValidationError::PercentageOutOfRange(percentage));
            }
            let amount = estimate * (Decimal::ONE - percentage / Decimal::ONE_HUNDRED);
            Ok(Bid {
                amount: round_money(amount),
                basis: BidBasis::PercentageBelow { percentage },
            })
        }
        Some(BidStrategy::FixedAmount) => {
            let amount = settings
                .fixed_amount
                .ok_or(ValidationError::MissingFixedAmount)?;
            if amount <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveFixedAmount(amount));
            }
            Ok(Bid {
                amount: round_money(amount),
                basis: BidBasis::FixedAmount,
            })
        }
        None => Ok(Bid::at_estimate(estimate)),
    }
}
