//! Portfolio-level Value at Risk.
//!
//! Each position's simple returns are weighted by the money invested in it and
//! summed per calendar day into a simulated portfolio value. A day only counts
//! when every position traded on it: exchanges with different holidays never
//! produce partially valued days.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::market_data::PriceSource;
use crate::returns::compute_returns;
use crate::types::{
    validate_confidence, validate_days, validate_value, Interval, Portfolio, PortfolioPosition,
    ReturnMode, ReturnSeries,
};
use crate::var::{quantile_rank, sorted};
use crate::{Error, Result};

/// Simulated portfolio value on one calendar day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PortfolioValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Historical simulation VaR for a multi-security portfolio.
///
/// Prices are fetched from `source` as daily series; returns are computed over
/// the full history and then restricted to `[date_from, date_to]`.
///
/// # Errors
///
/// * `Error::InvalidParameter` for an empty portfolio, non-positive position values,
///   a confidence outside (0, 1), a zero horizon or an inverted date window
/// * `Error::UnknownSymbol` / `Error::EmptySeries` from fetching and return computation
/// * `Error::InsufficientData` when no calendar day has a return for every position
pub fn estimate_portfolio_var(source: &dyn PriceSource, portfolio: &Portfolio) -> Result<f64> {
    validate_portfolio(portfolio)?;

    let mut position_returns = Vec::with_capacity(portfolio.positions.len());
    for position in &portfolio.positions {
        let prices = source.fetch(&position.symbol, Interval::Daily)?;
        let returns = compute_returns(&prices, ReturnMode::Simple)?
            .between(portfolio.date_from, portfolio.date_to);
        debug!(
            symbol = %position.symbol,
            returns = returns.len(),
            "loaded position returns"
        );
        position_returns.push((position.clone(), returns));
    }

    let var = portfolio_var_from_returns(
        &position_returns,
        portfolio.confidence_level,
        portfolio.horizon_days,
        portfolio.date_from,
        portfolio.date_to,
    )?;

    info!(
        positions = portfolio.position_count(),
        total_value = portfolio.total_value(),
        var,
        "estimated portfolio value at risk"
    );

    Ok(var)
}

/// Portfolio VaR from returns that have already been computed per position.
pub fn portfolio_var_from_returns(
    position_returns: &[(PortfolioPosition, ReturnSeries)],
    confidence_level: f64,
    horizon_days: usize,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<f64> {
    validate_confidence(confidence_level)?;
    validate_days("horizon_days", horizon_days)?;

    let values = portfolio_value_series(position_returns, date_from, date_to)?;
    let total_value: f64 = position_returns.iter().map(|(p, _)| p.value).sum();

    let simulated: Vec<f64> = values.iter().map(|p| p.value).collect();
    let simulated = sorted(&simulated);
    let worst_value = simulated[quantile_rank(confidence_level, simulated.len())];

    Ok((total_value - worst_value) * (horizon_days as f64).sqrt())
}

/// Value-weighted portfolio value for every calendar day in `[date_from, date_to]`
/// on which all positions have a return.
pub fn portfolio_value_series(
    position_returns: &[(PortfolioPosition, ReturnSeries)],
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<Vec<PortfolioValuePoint>> {
    check_positions_and_window(position_returns.len(), date_from, date_to)?;

    let lookups: Vec<(f64, HashMap<NaiveDate, f64>)> = position_returns
        .iter()
        .map(|(position, returns)| {
            let by_date = returns.points.iter().map(|p| (p.date, p.value)).collect();
            (position.value, by_date)
        })
        .collect();

    let mut series = Vec::new();
    let mut skipped = 0usize;
    for date in date_from.iter_days().take_while(|d| *d <= date_to) {
        let mut value = 0.0;
        let mut complete = true;
        for (weight, by_date) in &lookups {
            match by_date.get(&date) {
                Some(r) => value += weight * r,
                None => {
                    complete = false;
                    break;
                }
            }
        }

        if complete {
            series.push(PortfolioValuePoint { date, value });
        } else {
            skipped += 1;
        }
    }

    debug!(days = series.len(), skipped, "aligned portfolio calendar");

    if series.is_empty() {
        return Err(Error::InsufficientData(format!(
            "no day between {} and {} has returns for every position",
            date_from, date_to
        )));
    }

    Ok(series)
}

fn validate_portfolio(portfolio: &Portfolio) -> Result<()> {
    check_positions_and_window(
        portfolio.positions.len(),
        portfolio.date_from,
        portfolio.date_to,
    )?;
    for position in &portfolio.positions {
        validate_value("position.value", position.value)?;
    }
    validate_confidence(portfolio.confidence_level)?;
    validate_days("horizon_days", portfolio.horizon_days)
}

fn check_positions_and_window(
    positions: usize,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<()> {
    if positions == 0 {
        return Err(Error::invalid("positions", "portfolio has no positions"));
    }
    if date_from > date_to {
        return Err(Error::invalid(
            "date_from",
            format!("{} is after date_to {}", date_from, date_to),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::InMemoryPriceSource;
    use crate::types::{PriceBar, PriceSeries};
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 8, d).unwrap()
    }

    fn series(points: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            points
                .iter()
                .map(|&(d, close)| PriceBar::from_close(day(d), close))
                .collect(),
        )
        .unwrap()
    }

    /// Asset B does not trade on the 3rd.
    fn two_asset_source() -> InMemoryPriceSource {
        InMemoryPriceSource::new()
            .with_daily(
                "AAA",
                series(&[(1, 100.0), (2, 110.0), (3, 99.0), (4, 99.0), (5, 108.9)]),
            )
            .with_daily("BBB", series(&[(1, 50.0), (2, 55.0), (4, 60.5), (5, 48.4)]))
    }

    fn portfolio(from: u32, to: u32) -> Portfolio {
        Portfolio {
            positions: vec![
                PortfolioPosition::new("AAA", 1000.0),
                PortfolioPosition::new("BBB", 1000.0),
            ],
            date_from: day(from),
            date_to: day(to),
            confidence_level: 0.99,
            horizon_days: 4,
        }
    }

    fn position_returns(source: &InMemoryPriceSource) -> Vec<(PortfolioPosition, ReturnSeries)> {
        portfolio(1, 5)
            .positions
            .into_iter()
            .map(|p| {
                let prices = source.fetch(&p.symbol, Interval::Daily).unwrap();
                let returns = compute_returns(&prices, ReturnMode::Simple).unwrap();
                (p, returns)
            })
            .collect()
    }

    #[test]
    fn test_day_missing_for_one_asset_is_excluded() {
        let source = two_asset_source();
        let values = portfolio_value_series(&position_returns(&source), day(1), day(5)).unwrap();

        let dates: Vec<NaiveDate> = values.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(2), day(4), day(5)]);

        assert_relative_eq!(values[0].value, 2200.0, epsilon = 1e-6);
        assert_relative_eq!(values[1].value, 2100.0, epsilon = 1e-6);
        assert_relative_eq!(values[2].value, 1900.0, epsilon = 1e-6);
    }

    #[test]
    fn test_portfolio_var() {
        let var = estimate_portfolio_var(&two_asset_source(), &portfolio(1, 5)).unwrap();

        // Worst simulated value 1900 against 2000 invested, scaled by sqrt(4)
        assert_relative_eq!(var, 200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_window_restricts_days() {
        // Only the 2nd remains: value 2200, a gain
        let var = estimate_portfolio_var(&two_asset_source(), &portfolio(2, 3)).unwrap();
        assert_relative_eq!(var, -400.0, epsilon = 1e-6);
    }

    #[test]
    fn test_disjoint_calendars_insufficient_data() {
        let source = InMemoryPriceSource::new()
            .with_daily("AAA", series(&[(1, 10.0), (2, 11.0), (3, 12.0)]))
            .with_daily("BBB", series(&[(4, 10.0), (5, 11.0), (6, 12.0)]));
        let mut request = portfolio(1, 6);
        request.horizon_days = 1;

        assert!(matches!(
            estimate_portfolio_var(&source, &request),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_unknown_symbol_propagates() {
        let mut request = portfolio(1, 5);
        request.positions.push(PortfolioPosition::new("ZZZ", 10.0));

        assert!(matches!(
            estimate_portfolio_var(&two_asset_source(), &request),
            Err(Error::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_invalid_portfolios() {
        let source = two_asset_source();

        let mut empty = portfolio(1, 5);
        empty.positions.clear();
        assert!(matches!(
            estimate_portfolio_var(&source, &empty),
            Err(Error::InvalidParameter {
                name: "positions",
                ..
            })
        ));

        let mut inverted = portfolio(1, 5);
        inverted.date_from = day(6);
        assert!(matches!(
            estimate_portfolio_var(&source, &inverted),
            Err(Error::InvalidParameter {
                name: "date_from",
                ..
            })
        ));

        let mut negative = portfolio(1, 5);
        negative.positions[0].value = -1.0;
        assert!(estimate_portfolio_var(&source, &negative).is_err());
    }

    #[test]
    fn test_value_series_rejects_empty_and_inverted_inputs() {
        assert!(matches!(
            portfolio_value_series(&[], day(1), day(5)),
            Err(Error::InvalidParameter {
                name: "positions",
                ..
            })
        ));
        assert!(matches!(
            portfolio_value_series(&position_returns(&two_asset_source()), day(5), day(1)),
            Err(Error::InvalidParameter {
                name: "date_from",
                ..
            })
        ));
    }
}
