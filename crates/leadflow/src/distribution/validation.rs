use rust_decimal::Decimal;

use super::domain::{EstimatedValue, LeadSubmission};

/// Input rejected before any write takes place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("estimate missing")]
    EstimateMissing,
    #[error("estimate is invalid: {0}")]
    InvalidEstimate(String),
    #[error("location requires a zip code or a city and state")]
    MissingLocation,
    #[error("item {index} is invalid: {reason}")]
    InvalidItem { index: usize, reason: &'static str },
    #[error("percentage below estimate must be between 0 and 50, got {0}")]
    PercentageOutOfRange(Decimal),
    #[error("percentage-below bidding requires a percentage")]
    MissingPercentage,
    #[error("fixed bid amount must be greater than zero, got {0}")]
    NonPositiveFixedAmount(Decimal),
    #[error("fixed-amount bidding requires an amount")]
    MissingFixedAmount,
    #[error("accepted price must be greater than zero, got {0}")]
    NonPositivePrice(Decimal),
}

pub(crate) fn validate_submission(submission: &LeadSubmission) -> Result<(), ValidationError> {
    if !submission.location.is_addressable() {
        return Err(ValidationError::MissingLocation);
    }

    if let Some(estimate) = &submission.estimated_value {
        validate_estimate(estimate)?;
    }

    for (index, item) in submission.items.iter().enumerate() {
        if item.item_type.trim().is_empty() {
            return Err(ValidationError::InvalidItem {
                index,
                reason: "item type is required",
            });
        }
        if item.quantity == 0 {
            return Err(ValidationError::InvalidItem {
                index,
                reason: "quantity must be at least 1",
            });
        }
    }

    Ok(())
}

fn validate_estimate(estimate: &EstimatedValue) -> Result<(), ValidationError> {
    match estimate {
        EstimatedValue::Amount(amount) if amount.is_sign_negative() => Err(
            ValidationError::InvalidEstimate(format!("amount {amount} is negative")),
        ),
        EstimatedValue::Range { low, .. } if low.is_sign_negative() => Err(
            ValidationError::InvalidEstimate(format!("range low {low} is negative")),
        ),
        EstimatedValue::Range { low, high } if low > high => Err(ValidationError::InvalidEstimate(
            format!("range low {low} exceeds high {high}"),
        )),
        _ => Ok(()),
    }
}
