//! Price-to-return conversion.
//!
//! Every return relates a session's close to the close of the session before it
//! and is dated at the later session, so a series of `n` prices yields `n - 1`
//! returns and the first session never carries one.

use crate::types::{PriceSeries, ReturnMode, ReturnPoint, ReturnSeries};
use crate::{Error, Result};

/// Convert a price series into a return series.
///
/// # Arguments
///
/// * `prices` - Chronologically ordered prices
/// * `mode` - `Simple` for the gross ratio `p[t+1] / p[t]`, `Log` for its natural log
///
/// # Errors
///
/// Returns `Error::EmptySeries` when fewer than two prices are supplied.
pub fn compute_returns(prices: &PriceSeries, mode: ReturnMode) -> Result<ReturnSeries> {
    if prices.len() < 2 {
        return Err(Error::EmptySeries(prices.len()));
    }

    let points = prices
        .bars()
        .windows(2)
        .map(|pair| ReturnPoint {
            date: pair[1].date,
            value: ratio(pair[0].close, pair[1].close, mode),
        })
        .collect();

    Ok(ReturnSeries { mode, points })
}

/// Undated variant over bare closes, used where only the values matter.
///
/// Closes get the same check as [`PriceSeries::new`]: each must be positive and
/// finite, otherwise `Error::InvalidPriceData`.
pub fn returns_from_closes(closes: &[f64], mode: ReturnMode) -> Result<Vec<f64>> {
    if closes.len() < 2 {
        return Err(Error::EmptySeries(closes.len()));
    }
    if let Some((i, bad)) = closes
        .iter()
        .enumerate()
        .find(|(_, c)| !(c.is_finite() && **c > 0.0))
    {
        return Err(Error::InvalidPriceData(format!(
            "close at index {} must be positive, got {}",
            i, bad
        )));
    }

    Ok(closes
        .windows(2)
        .map(|pair| ratio(pair[0], pair[1], mode))
        .collect())
}

#[inline]
fn ratio(previous: f64, current: f64, mode: ReturnMode) -> f64 {
    let gross = current / previous;
    match mode {
        ReturnMode::Simple => gross,
        ReturnMode::Log => gross.ln(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn prices(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 8, 14).unwrap();
        PriceSeries::from_closes(start, closes).unwrap()
    }

    #[test]
    fn test_simple_returns_exact() {
        let returns = compute_returns(&prices(&[10.0, 20.0, 30.0, 90.0, 45.0]), ReturnMode::Simple)
            .unwrap();

        assert_eq!(returns.values(), vec![2.0, 1.5, 3.0, 0.5]);
        assert_eq!(returns.mode, ReturnMode::Simple);
    }

    #[test]
    fn test_returns_dated_at_later_session() {
        let returns =
            compute_returns(&prices(&[10.0, 20.0, 30.0]), ReturnMode::Simple).unwrap();

        assert_eq!(returns.len(), 2);
        assert_eq!(
            returns.points[0].date,
            NaiveDate::from_ymd_opt(2023, 8, 15).unwrap()
        );
        assert_eq!(
            returns.points[1].date,
            NaiveDate::from_ymd_opt(2023, 8, 16).unwrap()
        );
    }

    #[test]
    fn test_log_returns() {
        let returns =
            compute_returns(&prices(&[100.0, 110.0, 99.0]), ReturnMode::Log).unwrap();
        let values = returns.values();

        assert_relative_eq!(values[0], (1.1f64).ln(), epsilon = 1e-12);
        assert_relative_eq!(values[1], (0.9f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_compute_returns_is_pure() {
        let series = prices(&[10.0, 12.0, 11.0, 13.5]);
        let first = compute_returns(&series, ReturnMode::Log).unwrap();
        let second = compute_returns(&series, ReturnMode::Log).unwrap();

        assert_eq!(first, second);
        assert_eq!(series.closes(), vec![10.0, 12.0, 11.0, 13.5]);
    }

    #[test]
    fn test_empty_series_error() {
        let result = compute_returns(&prices(&[10.0]), ReturnMode::Simple);
        assert!(matches!(result, Err(Error::EmptySeries(1))));

        let result = compute_returns(&PriceSeries::default(), ReturnMode::Log);
        assert!(matches!(result, Err(Error::EmptySeries(0))));
    }

    #[test]
    fn test_returns_from_closes_matches_dated_version() {
        let closes = [10.0, 20.0, 30.0, 90.0, 45.0];
        let bare = returns_from_closes(&closes, ReturnMode::Simple).unwrap();
        let dated = compute_returns(&prices(&closes), ReturnMode::Simple).unwrap();

        assert_eq!(bare, dated.values());
        assert!(returns_from_closes(&[], ReturnMode::Log).is_err());
    }

    #[test]
    fn test_returns_from_closes_rejects_non_positive() {
        for closes in [[10.0, 0.0, 12.0], [10.0, -3.0, 12.0], [10.0, f64::NAN, 12.0]] {
            assert!(matches!(
                returns_from_closes(&closes, ReturnMode::Log),
                Err(Error::InvalidPriceData(_))
            ));
        }
    }
}
