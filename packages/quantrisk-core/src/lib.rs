//! QuantRisk Core - Risk analytics for security price series.
//!
//! This crate provides the numerical engine behind the risk API:
//!
//! - **Returns**: Simple (gross ratio) and logarithmic return series
//! - **Value at Risk**: Historical simulation, linear (variance-covariance) and Monte Carlo
//! - **Portfolio VaR**: Historical simulation over a value-weighted, calendar-aligned portfolio
//! - **Hurst exponent**: Rescaled-range (R/S) analysis of log-returns
//! - **Analysis**: Request orchestration and a persisted analysis history
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use quantrisk_core::{compute_returns, estimate_var, PriceSeries, ReturnMode, VarMethod};
//!
//! let start = NaiveDate::from_ymd_opt(2023, 8, 14).unwrap();
//! let prices = PriceSeries::from_closes(start, &[10.0, 20.0, 30.0, 90.0, 45.0]).unwrap();
//!
//! let returns = compute_returns(&prices, ReturnMode::Simple).unwrap();
//! assert_eq!(returns.values(), vec![2.0, 1.5, 3.0, 0.5]);
//!
//! let var = estimate_var(VarMethod::Historical, &returns, 0.99, 1_000_000.0, 200, 10).unwrap();
//! assert!(var > 0.0);
//! ```

pub mod analysis;
pub mod config;
pub mod history;
pub mod hurst;
pub mod market_data;
pub mod portfolio;
pub mod returns;
pub mod types;
pub mod var;

// Re-export commonly used types
pub use types::{
    ApiResponse, HurstResult, Interval, Portfolio, PortfolioPosition, PriceBar, PriceSeries,
    RescaledRangePoint, ReturnMode, ReturnPoint, ReturnSeries, VarParameters,
};

// Re-export main functionality
pub use analysis::{
    analyze, analyze_portfolio, AnalysisReport, AnalysisRequest, ChartPoint, PortfolioReport,
    PortfolioRequest, Statistic,
};
pub use config::Settings;
pub use history::{AnalysisHistory, HistoryEntry, HistoryKind};
pub use hurst::estimate_hurst;
pub use market_data::{CsvPriceSource, InMemoryPriceSource, PriceSource, SymbolMatch};
pub use portfolio::estimate_portfolio_var;
pub use returns::compute_returns;
pub use var::{estimate_var, estimate_var_with, norm_ppf, MonteCarloConfig, VarMethod};

/// Error types for quantrisk-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Price series needs at least 2 points, got {0}")]
    EmptySeries(usize),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unknown estimator kind: {0}")]
    UnknownEstimatorKind(String),

    #[error("Invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("History entry not found: {0}")]
    EntryNotFound(u64),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl ToString) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }
}

/// Result type for quantrisk-core operations.
pub type Result<T> = std::result::Result<T, Error>;
