//! Core data types for the risk engine.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::var::VarMethod;
use crate::{Error, Result};

/// One trading session of OHLCV data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    /// Session date
    pub date: NaiveDate,
    /// Bar time of day, present for intraday intervals only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Create a bar where every price field equals `close`.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            time: None,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    /// Same bar stamped with a time of day.
    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Ordering key: the session date plus the time of day, midnight when absent.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

/// Chronologically ordered price history, one bar per session.
///
/// Timestamps are strictly increasing and every close is positive and finite.
/// Intraday series hold many bars per date, told apart by their time of day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from bars in any order.
    ///
    /// Bars are sorted by timestamp. Duplicate timestamps and non-positive or
    /// non-finite closes are rejected.
    pub fn new(mut bars: Vec<PriceBar>) -> Result<Self> {
        bars.sort_by_key(PriceBar::timestamp);

        for pair in bars.windows(2) {
            if pair[0].timestamp() == pair[1].timestamp() {
                return Err(Error::InvalidPriceData(match pair[0].time {
                    Some(_) => format!("duplicate bar timestamp {}", pair[0].timestamp()),
                    None => format!("duplicate session date {}", pair[0].date),
                }));
            }
        }

        if let Some(bad) = bars.iter().find(|b| !(b.close.is_finite() && b.close > 0.0)) {
            return Err(Error::InvalidPriceData(format!(
                "close on {} must be positive, got {}",
                bad.date, bad.close
            )));
        }

        Ok(Self { bars })
    }

    /// Build a daily series from closes, starting at `start` and advancing one calendar day per value.
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar::from_close(start + Duration::days(i as i64), close))
            .collect();
        Self::new(bars)
    }

    /// Restrict to sessions within `[from, to]` inclusive.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= from && b.date <= to)
                .copied()
                .collect(),
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// Close prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

/// How consecutive prices are turned into a return.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    /// Gross ratio `price[t+1] / price[t]`
    #[default]
    Simple,
    /// `ln(price[t+1] / price[t])`
    Log,
}

impl FromStr for ReturnMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ReturnMode::Simple),
            "log" => Ok(ReturnMode::Log),
            other => Err(Error::invalid("mode", other)),
        }
    }
}

/// A return dated at the later of the two sessions it compares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Chronologically ordered returns, one fewer than the prices they came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReturnSeries {
    pub mode: ReturnMode,
    pub points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Build a series directly from return values (no dates needed by the estimators).
    ///
    /// Values are dated one calendar day apart starting at `start`.
    pub fn from_values(mode: ReturnMode, start: NaiveDate, values: &[f64]) -> Self {
        Self {
            mode,
            points: values
                .iter()
                .enumerate()
                .map(|(i, &value)| ReturnPoint {
                    date: start + Duration::days(i as i64),
                    value,
                })
                .collect(),
        }
    }

    /// Return values in chronological order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// The most recent `days` points, or the whole series when it is shorter.
    pub fn window(&self, days: usize) -> &[ReturnPoint] {
        let start = self.points.len().saturating_sub(days);
        &self.points[start..]
    }

    /// Restrict to returns dated within `[from, to]` inclusive.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            mode: self.mode,
            points: self
                .points
                .iter()
                .filter(|p| p.date >= from && p.date <= to)
                .copied()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Sampling interval offered by the market-data provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Interval {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "60min")]
    SixtyMinutes,
    #[default]
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Interval {
    pub const ALL: [Interval; 8] = [
        Interval::OneMinute,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::SixtyMinutes,
        Interval::Daily,
        Interval::Weekly,
        Interval::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1min",
            Interval::FiveMinutes => "5min",
            Interval::FifteenMinutes => "15min",
            Interval::ThirtyMinutes => "30min",
            Interval::SixtyMinutes => "60min",
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
        }
    }

    /// Whether bars carry an intraday timestamp rather than a session date.
    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Interval::OneMinute
                | Interval::FiveMinutes
                | Interval::FifteenMinutes
                | Interval::ThirtyMinutes
                | Interval::SixtyMinutes
        )
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_lowercase();
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == tag)
            .ok_or_else(|| Error::invalid("interval", s))
    }
}

/// Parameters shared by the single-security VaR estimators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VarParameters {
    /// Estimator to use
    pub method: VarMethod,
    /// Confidence level in (0, 1), e.g. 0.99
    pub confidence_level: f64,
    /// Monetary value exposed to the security
    pub portfolio_value: f64,
    /// Number of most recent returns to sample
    pub historical_days: usize,
    /// Projection horizon in days (square-root-of-time scaling)
    pub horizon_days: usize,
}

impl Default for VarParameters {
    fn default() -> Self {
        Self {
            method: VarMethod::Historical,
            confidence_level: 0.99,
            portfolio_value: 1_000_000.0,
            historical_days: 200,
            horizon_days: 1,
        }
    }
}

impl VarParameters {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        validate_confidence(self.confidence_level)?;
        validate_value("portfolio_value", self.portfolio_value)?;
        validate_days("historical_days", self.historical_days)?;
        validate_days("horizon_days", self.horizon_days)
    }
}

pub(crate) fn validate_confidence(confidence_level: f64) -> Result<()> {
    if confidence_level > 0.0 && confidence_level < 1.0 {
        Ok(())
    } else {
        Err(Error::invalid("confidence_level", confidence_level))
    }
}

pub(crate) fn validate_value(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(name, value))
    }
}

pub(crate) fn validate_days(name: &'static str, days: usize) -> Result<()> {
    if days >= 1 {
        Ok(())
    } else {
        Err(Error::invalid(name, days))
    }
}

/// A holding expressed as money invested in one symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioPosition {
    /// Ticker symbol (uppercase)
    pub symbol: String,
    /// Monetary value of the holding
    pub value: f64,
}

impl PortfolioPosition {
    pub fn new(symbol: &str, value: f64) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            value,
        }
    }
}

/// Positions plus the shared window and VaR settings used to assess them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub positions: Vec<PortfolioPosition>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub confidence_level: f64,
    pub horizon_days: usize,
}

impl Portfolio {
    /// Sum of position values at request time.
    pub fn total_value(&self) -> f64 {
        self.positions.iter().map(|p| p.value).sum()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}

/// One data point of the rescaled-range regression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RescaledRangePoint {
    /// Block length `n`
    pub interval_length: usize,
    /// Mean R/S over all full blocks of length `n`
    pub mean_rescaled_range: f64,
}

/// Hurst exponent and the data behind its log-log fit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HurstResult {
    /// Slope of log(mean R/S) against log(n); not clamped to [0, 1]
    pub exponent: f64,
    pub diagnostics: Vec<RescaledRangePoint>,
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<Result<T>> for ApiResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }
}
