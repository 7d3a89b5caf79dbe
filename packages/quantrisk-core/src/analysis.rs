//! Request-level orchestration.
//!
//! An analysis request names a security, an interval and the statistics to
//! compute. The report bundles the results with the close series the charting
//! layer plots, ready to be returned to the caller or appended to the history.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::hurst::estimate_hurst;
use crate::market_data::PriceSource;
use crate::portfolio::estimate_portfolio_var;
use crate::returns::compute_returns;
use crate::types::{HurstResult, Interval, Portfolio, ReturnMode, VarParameters};
use crate::var::{estimate_var_with, MonteCarloConfig, VarMethod};
use crate::{Error, Result};

/// Statistic a caller can ask for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Var,
    Hurst,
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "var" => Ok(Statistic::Var),
            "hurst" => Ok(Statistic::Hurst),
            other => Err(Error::invalid("calculate", other)),
        }
    }
}

/// Single-security analysis request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub symbol: String,
    #[serde(default)]
    pub interval: Interval,
    #[serde(default)]
    pub calculate: Vec<Statistic>,
    #[serde(default)]
    pub var: VarParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl AnalysisRequest {
    pub fn new(symbol: &str, interval: Interval, calculate: Vec<Statistic>) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            interval,
            calculate,
            var: VarParameters::default(),
            date_from: None,
            date_to: None,
        }
    }

    fn wants(&self, statistic: Statistic) -> bool {
        self.calculate.contains(&statistic)
    }
}

/// One point of the series handed to the charting layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub date: NaiveDate,
    /// Time of day for intraday bars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    pub close: f64,
}

/// VaR figure together with the parameters that produced it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VarOutcome {
    pub method: VarMethod,
    pub confidence_level: f64,
    pub portfolio_value: f64,
    /// Number of returns actually sampled
    pub historical_days: usize,
    pub horizon_days: usize,
    pub value: f64,
}

impl VarOutcome {
    /// One-line description for display.
    pub fn summary(&self) -> String {
        format!(
            "The VaR at the {:.2} confidence level and portfolio value {:.2} is {:.2}",
            self.confidence_level, self.portfolio_value, self.value
        )
    }
}

/// Result of a single-security analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub symbol: String,
    pub interval: Interval,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub var: Option<VarOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hurst: Option<HurstResult>,
    pub chart: Vec<ChartPoint>,
    pub generated_at: DateTime<Utc>,
}

/// Fetch prices for `request` and compute every requested statistic.
///
/// The historical window is clamped to the available returns before it reaches
/// the estimator, and the clamped figure is reported back.
pub fn analyze(
    source: &dyn PriceSource,
    request: &AnalysisRequest,
    monte_carlo: &MonteCarloConfig,
) -> Result<AnalysisReport> {
    if request.wants(Statistic::Var) {
        request.var.validate()?;
    }

    let mut prices = source.fetch(&request.symbol, request.interval)?;
    if request.date_from.is_some() || request.date_to.is_some() {
        let from = request.date_from.unwrap_or(NaiveDate::MIN);
        let to = request.date_to.unwrap_or(NaiveDate::MAX);
        if from > to {
            return Err(Error::invalid(
                "date_from",
                format!("{} is after date_to {}", from, to),
            ));
        }
        prices = prices.between(from, to);
    }

    let var = if request.wants(Statistic::Var) {
        let params = &request.var;
        let returns = compute_returns(&prices, ReturnMode::Simple)?;
        let historical_days = params.historical_days.min(returns.len());
        let value = estimate_var_with(
            params.method,
            &returns,
            params.confidence_level,
            params.portfolio_value,
            historical_days,
            params.horizon_days,
            monte_carlo,
        )?;
        Some(VarOutcome {
            method: params.method,
            confidence_level: params.confidence_level,
            portfolio_value: params.portfolio_value,
            historical_days,
            horizon_days: params.horizon_days,
            value,
        })
    } else {
        None
    };

    let hurst = if request.wants(Statistic::Hurst) {
        Some(estimate_hurst(&prices)?)
    } else {
        None
    };

    let chart = prices
        .bars()
        .iter()
        .map(|b| ChartPoint {
            date: b.date,
            time: b.time,
            close: b.close,
        })
        .collect();

    info!(
        symbol = %request.symbol,
        interval = %request.interval,
        sessions = prices.len(),
        var = var.map(|v| v.value),
        hurst = hurst.as_ref().map(|h| h.exponent),
        "analysis complete"
    );

    Ok(AnalysisReport {
        symbol: request.symbol.clone(),
        interval: request.interval,
        date_from: prices.first_date(),
        date_to: prices.last_date(),
        var,
        hurst,
        chart,
        generated_at: Utc::now(),
    })
}

/// Portfolio requests carry the positions, window and VaR settings together.
pub type PortfolioRequest = Portfolio;

/// Result of a portfolio VaR request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioReport {
    pub portfolio: Portfolio,
    pub total_value: f64,
    pub var: f64,
    pub generated_at: DateTime<Utc>,
}

/// Compute portfolio VaR and wrap it in a report.
pub fn analyze_portfolio(
    source: &dyn PriceSource,
    request: &PortfolioRequest,
) -> Result<PortfolioReport> {
    let var = estimate_portfolio_var(source, request)?;
    Ok(PortfolioReport {
        portfolio: request.clone(),
        total_value: request.total_value(),
        var,
        generated_at: Utc::now(),
    })
}
