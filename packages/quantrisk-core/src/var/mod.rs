//! Value-at-Risk estimation.
//!
//! Three interchangeable estimators share one contract: given a return series,
//! a confidence level, the exposed value, the number of most recent returns to
//! sample and a horizon, produce a monetary loss (positive = loss).
//!
//! - **Historical simulation**: empirical loss quantile of past gross returns
//! - **Linear model**: normal quantile times the sample standard deviation
//! - **Monte Carlo**: empirical quantile of synthetic normal draws

mod historical;
mod linear;
mod monte_carlo;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{validate_confidence, validate_days, validate_value, ReturnSeries};
use crate::{Error, Result};

pub use historical::historical_var;
pub use linear::{linear_var, norm_ppf};
pub use monte_carlo::{monte_carlo_var, MonteCarloConfig, DEFAULT_SAMPLES};

/// VaR estimator selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    #[default]
    Historical,
    Linear,
    MonteCarlo,
}

impl VarMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarMethod::Historical => "historical",
            VarMethod::Linear => "linear",
            VarMethod::MonteCarlo => "monte_carlo",
        }
    }
}

impl fmt::Display for VarMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VarMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "historical" => Ok(VarMethod::Historical),
            "linear" | "linear_model" => Ok(VarMethod::Linear),
            "monte_carlo" => Ok(VarMethod::MonteCarlo),
            _ => Err(Error::UnknownEstimatorKind(s.to_string())),
        }
    }
}

/// Estimate VaR with the default Monte Carlo configuration.
///
/// # Arguments
///
/// * `method` - Estimator to use
/// * `returns` - Return series (simple returns for the historical estimator)
/// * `confidence_level` - Confidence in (0, 1), e.g. 0.99
/// * `portfolio_value` - Monetary value exposed
/// * `historical_days` - Number of most recent returns to sample; silently clamped to the series length
/// * `horizon_days` - Horizon for square-root-of-time scaling
pub fn estimate_var(
    method: VarMethod,
    returns: &ReturnSeries,
    confidence_level: f64,
    portfolio_value: f64,
    historical_days: usize,
    horizon_days: usize,
) -> Result<f64> {
    estimate_var_with(
        method,
        returns,
        confidence_level,
        portfolio_value,
        historical_days,
        horizon_days,
        &MonteCarloConfig::default(),
    )
}

/// Estimate VaR with an explicit Monte Carlo configuration.
pub fn estimate_var_with(
    method: VarMethod,
    returns: &ReturnSeries,
    confidence_level: f64,
    portfolio_value: f64,
    historical_days: usize,
    horizon_days: usize,
    monte_carlo: &MonteCarloConfig,
) -> Result<f64> {
    validate_confidence(confidence_level)?;
    validate_value("portfolio_value", portfolio_value)?;
    validate_days("historical_days", historical_days)?;
    validate_days("horizon_days", horizon_days)?;

    if historical_days > returns.len() {
        warn!(
            requested = historical_days,
            available = returns.len(),
            "historical window exceeds return series, using all returns"
        );
    }

    let sample: Vec<f64> = returns.window(historical_days).iter().map(|p| p.value).collect();
    if sample.is_empty() {
        return Err(Error::InsufficientData(
            "no returns available in the historical window".to_string(),
        ));
    }

    let var = match method {
        VarMethod::Historical => {
            historical_var(&sample, confidence_level, portfolio_value, horizon_days)?
        }
        VarMethod::Linear => linear_var(&sample, confidence_level, portfolio_value, horizon_days)?,
        VarMethod::MonteCarlo => monte_carlo_var(
            &sample,
            confidence_level,
            portfolio_value,
            horizon_days,
            monte_carlo,
        )?,
    };

    debug!(
        method = %method,
        sample = sample.len(),
        confidence_level,
        horizon_days,
        var,
        "estimated value at risk"
    );

    Ok(var)
}

/// Index of the empirical loss quantile in an ascending sample of `n` values.
///
/// `floor((1 - confidence) * n)`, never past the last element.
pub(crate) fn quantile_rank(confidence_level: f64, n: usize) -> usize {
    let rank = ((1.0 - confidence_level) * n as f64).floor() as usize;
    rank.min(n.saturating_sub(1))
}

/// Sort ascending, treating incomparable values as equal.
pub(crate) fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::returns::compute_returns;
    use crate::types::{PriceBar, PriceSeries, ReturnMode};
    use chrono::NaiveDate;

    fn returns(values: &[f64]) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2023, 8, 15).unwrap();
        ReturnSeries::from_values(ReturnMode::Simple, start, values)
    }

    fn fixture_prices() -> PriceSeries {
        let mut reader =
            csv::Reader::from_reader(include_str!("../../fixtures/daily_close.csv").as_bytes());
        let bars: Vec<PriceBar> = reader
            .records()
            .map(|record| {
                let record = record.unwrap();
                let close: f64 = record[4].parse().unwrap();
                PriceBar::from_close(record[0].parse().unwrap(), close)
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("historical".parse::<VarMethod>().unwrap(), VarMethod::Historical);
        assert_eq!("linear_model".parse::<VarMethod>().unwrap(), VarMethod::Linear);
        assert_eq!("Monte-Carlo".parse::<VarMethod>().unwrap(), VarMethod::MonteCarlo);
        assert!(matches!(
            "garch".parse::<VarMethod>(),
            Err(Error::UnknownEstimatorKind(_))
        ));
    }

    #[test]
    fn test_method_serde_tag() {
        assert_eq!(
            serde_json::to_string(&VarMethod::MonteCarlo).unwrap(),
            "\"monte_carlo\""
        );
    }

    #[test]
    fn test_historical_var_reference_value() {
        let series = returns(&[1.1, 1.2, 1.1, 0.9]);
        let var = estimate_var(VarMethod::Historical, &series, 0.99, 1_000_000.0, 200, 10).unwrap();

        assert_eq!(var.floor() as i64, 316227);
    }

    #[test]
    fn test_historical_var_from_price_fixture() {
        let prices = fixture_prices();
        assert_eq!(prices.len(), 260);

        let series = compute_returns(&prices, ReturnMode::Simple).unwrap();
        let var = estimate_var(VarMethod::Historical, &series, 0.99, 1_000_000.0, 200, 10).unwrap();

        assert_eq!(var.floor() as i64, 113900);
    }

    #[test]
    fn test_oversized_window_uses_full_series() {
        let series = returns(&[1.01, 0.98, 1.02, 0.97, 1.0]);
        let clamped =
            estimate_var(VarMethod::Historical, &series, 0.95, 1000.0, 10_000, 1).unwrap();
        let exact = estimate_var(VarMethod::Historical, &series, 0.95, 1000.0, 5, 1).unwrap();

        assert_eq!(clamped, exact);

        let linear_clamped = estimate_var(VarMethod::Linear, &series, 0.95, 1000.0, 10_000, 1);
        assert!(linear_clamped.is_ok());
    }

    #[test]
    fn test_window_uses_most_recent_returns() {
        // The big early drawdown falls outside a two-day window
        let series = returns(&[0.5, 1.01, 0.99]);
        let var = estimate_var(VarMethod::Historical, &series, 0.99, 100.0, 2, 1).unwrap();

        approx::assert_relative_eq!(var, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_returns_insufficient_data() {
        let series = returns(&[]);
        for method in [VarMethod::Historical, VarMethod::Linear, VarMethod::MonteCarlo] {
            let result = estimate_var(method, &series, 0.99, 1000.0, 10, 1);
            assert!(matches!(result, Err(Error::InsufficientData(_))));
        }
    }

    #[test]
    fn test_invalid_parameters() {
        let series = returns(&[1.01, 0.99]);

        let result = estimate_var(VarMethod::Historical, &series, 0.0, 1000.0, 10, 1);
        assert!(matches!(
            result,
            Err(Error::InvalidParameter {
                name: "confidence_level",
                ..
            })
        ));

        let result = estimate_var(VarMethod::Historical, &series, 0.99, -5.0, 10, 1);
        assert!(matches!(
            result,
            Err(Error::InvalidParameter {
                name: "portfolio_value",
                ..
            })
        ));

        let result = estimate_var(VarMethod::Linear, &series, 0.99, 1000.0, 0, 1);
        assert!(matches!(
            result,
            Err(Error::InvalidParameter {
                name: "historical_days",
                ..
            })
        ));

        let result = estimate_var(VarMethod::MonteCarlo, &series, 0.99, 1000.0, 10, 0);
        assert!(matches!(
            result,
            Err(Error::InvalidParameter {
                name: "horizon_days",
                ..
            })
        ));
    }

    #[test]
    fn test_linear_var_monotone_in_confidence() {
        let series = compute_returns(&fixture_prices(), ReturnMode::Simple).unwrap();

        let mut previous = 0.0;
        for confidence in [0.5, 0.8, 0.9, 0.95, 0.975, 0.99, 0.995, 0.999] {
            let var = estimate_var(VarMethod::Linear, &series, confidence, 1_000_000.0, 200, 1)
                .unwrap();
            assert!(var >= previous, "{} < {} at {}", var, previous, confidence);
            previous = var;
        }
    }

    #[test]
    fn test_quantile_rank() {
        assert_eq!(quantile_rank(0.99, 4), 0);
        assert_eq!(quantile_rank(0.95, 100), 5);
        assert_eq!(quantile_rank(0.5, 3), 1);
        assert_eq!(quantile_rank(0.01, 10), 9);
    }

    #[test]
    fn test_sample_std_dev() {
        approx::assert_relative_eq!(
            sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]),
            (32.0f64 / 7.0).sqrt(),
            epsilon = 1e-12
        );
        assert_eq!(sample_std_dev(&[1.0]), 0.0);
    }
}
