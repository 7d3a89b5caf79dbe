//! Historical simulation VaR.

use super::{quantile_rank, sorted};
use crate::{Error, Result};

/// Historical simulation VaR over a window of gross returns.
///
/// Sorts the sample ascending, takes the return at rank
/// `floor((1 - confidence) * n)` without interpolation, revalues the position
/// with it and scales the loss by `sqrt(horizon_days)`.
pub fn historical_var(
    sample: &[f64],
    confidence_level: f64,
    portfolio_value: f64,
    horizon_days: usize,
) -> Result<f64> {
    if sample.is_empty() {
        return Err(Error::InsufficientData(
            "historical simulation needs at least one return".to_string(),
        ));
    }

    let sorted_returns = sorted(sample);
    let worst_return = sorted_returns[quantile_rank(confidence_level, sorted_returns.len())];
    let worst_portfolio_value = worst_return * portfolio_value;

    Ok((portfolio_value - worst_portfolio_value) * (horizon_days as f64).sqrt())
}
