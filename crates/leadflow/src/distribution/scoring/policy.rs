use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::RankedProvider;

const SMALL_JOB_CEILING: Decimal = dec!(500);
const MEDIUM_JOB_CEILING: Decimal = dec!(1500);

/// Number of providers a lead is offered to, scaled by its estimated value.
pub fn recipient_count(estimated_value: Decimal) -> usize {
    if estimated_value < SMALL_JOB_CEILING {
        2
    } else if estimated_value < MEDIUM_JOB_CEILING {
        3
    } else {
        4
    }
}

/// Head of the ranking sized by [`recipient_count`]. Short lists are sent in full.
pub fn select_recipients(
    mut ranked: Vec<RankedProvider>,
    estimated_value: Decimal,
) -> Vec<RankedProvider> {
    ranked.truncate(recipient_count(estimated_value));
    ranked
}
