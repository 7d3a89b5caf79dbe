//! Hurst exponent via rescaled-range (R/S) analysis.
//!
//! For every block length `n` from 5 to half the log-return count, the series
//! is cut into non-overlapping blocks, each block's cumulative mean-adjusted
//! range is divided by its standard deviation, and the ratios are averaged.
//! The exponent is the least-squares slope of `ln(mean R/S)` on `ln(n)`.
//!
//! The estimate is not clamped to [0, 1].

use tracing::{debug, warn};

use crate::returns::returns_from_closes;
use crate::types::{HurstResult, PriceSeries, RescaledRangePoint, ReturnMode};
use crate::{Error, Result};

/// Shortest block length tested.
pub const MIN_INTERVAL: usize = 5;

/// Fewest log-returns that leave room for one full block of the shortest length.
pub const MIN_RETURNS: usize = 2 * MIN_INTERVAL;

/// Estimate the Hurst exponent of a price series.
///
/// # Errors
///
/// * `Error::EmptySeries` for fewer than two prices
/// * `Error::InsufficientData` for fewer than 10 log-returns, or when fewer than
///   two block lengths produce a positive mean R/S to regress on
pub fn estimate_hurst(prices: &PriceSeries) -> Result<HurstResult> {
    estimate_hurst_from_closes(&prices.closes())
}

/// Estimate the Hurst exponent from bare chronological closes.
pub fn estimate_hurst_from_closes(closes: &[f64]) -> Result<HurstResult> {
    let log_returns = returns_from_closes(closes, ReturnMode::Log)?;
    let m = log_returns.len();
    if m < MIN_RETURNS {
        return Err(Error::InsufficientData(format!(
            "Hurst estimation needs at least {} log-returns, got {}",
            MIN_RETURNS, m
        )));
    }

    let diagnostics: Vec<RescaledRangePoint> = (MIN_INTERVAL..=m / 2)
        .map(|n| RescaledRangePoint {
            interval_length: n,
            mean_rescaled_range: mean_rescaled_range(&log_returns, n),
        })
        .collect();

    let (log_n, log_rs): (Vec<f64>, Vec<f64>) = diagnostics
        .iter()
        .filter(|p| p.mean_rescaled_range > 0.0)
        .map(|p| {
            (
                (p.interval_length as f64).ln(),
                p.mean_rescaled_range.ln(),
            )
        })
        .unzip();

    if log_n.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "R/S regression needs at least 2 interval lengths with positive R/S, got {}",
            log_n.len()
        )));
    }

    let exponent = ols_slope(&log_n, &log_rs);
    debug!(
        returns = m,
        points = log_n.len(),
        exponent,
        "estimated hurst exponent"
    );

    Ok(HurstResult {
        exponent,
        diagnostics,
    })
}

/// Average R/S over the `floor(len / n)` full blocks of length `n`.
fn mean_rescaled_range(data: &[f64], n: usize) -> f64 {
    let blocks = data.len() / n;
    let mut degenerate = 0usize;

    let total: f64 = data
        .chunks_exact(n)
        .map(|block| match rescaled_range(block) {
            Some(rs) => rs,
            None => {
                degenerate += 1;
                0.0
            }
        })
        .sum();

    if degenerate > 0 {
        warn!(
            interval_length = n,
            degenerate, "constant blocks contribute zero rescaled range"
        );
    }

    total / blocks as f64
}

/// R/S of one block, or `None` when the block has zero deviation.
fn rescaled_range(block: &[f64]) -> Option<f64> {
    let len = block.len() as f64;
    let mean = block.iter().sum::<f64>() / len;

    let mut cumsum = 0.0;
    let mut max_dev = f64::NEG_INFINITY;
    let mut min_dev = f64::INFINITY;
    let mut squares = 0.0;
    for &value in block {
        let adjusted = value - mean;
        squares += adjusted * adjusted;
        cumsum += adjusted;
        max_dev = max_dev.max(cumsum);
        min_dev = min_dev.min(cumsum);
    }

    let std_dev = (squares / len).sqrt();
    if std_dev > 0.0 {
        Some((max_dev - min_dev) / std_dev)
    } else {
        None
    }
}

/// Least-squares slope of `y` on `x`.
fn ols_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (covariance, variance) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(cov, var), (xi, yi)| {
            let dx = xi - mean_x;
            (cov + dx * (yi - mean_y), var + dx * dx)
        });

    covariance / variance
}
